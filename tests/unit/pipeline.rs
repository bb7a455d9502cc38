use image::Rgba;

use super::*;
use crate::encode::manifest::ManifestEntry;
use crate::encode::sink::InMemorySink;
use crate::foundation::core::{ColorDepth, Rotation};

fn cfg(side: u32) -> ConvertConfig {
    ConvertConfig {
        width: side,
        height: side,
        ..ConvertConfig::default()
    }
}

fn solid(w: u32, h: u32, v: u8) -> RgbaImage {
    RgbaImage::from_pixel(w, h, Rgba([v, v, v, 255]))
}

fn source(name: &str, count: u8) -> FramepackResult<SourceFrames> {
    Ok(SourceFrames::from_frames(
        name,
        (0..count).map(|i| solid(6, 4, i * 20)).collect(),
    ))
}

fn run(cfg: &ConvertConfig, sources: Vec<FramepackResult<SourceFrames>>) -> (InMemorySink, ManifestBuilder, ConvertContext) {
    let mut sink = InMemorySink::new();
    sink.begin(sink_config(cfg, cfg.geometry().unwrap(), cfg.pixel_format()).unwrap())
        .unwrap();
    let mut manifest = ManifestBuilder::new();
    let ctx = convert_sources(cfg, sources, &mut sink, &mut manifest).unwrap();
    (sink, manifest, ctx)
}

/// Wraps [`InMemorySink`] and fails the listed write attempts.
struct FlakySink {
    inner: InMemorySink,
    attempts: usize,
    fail_on: Vec<(usize, std::io::ErrorKind)>,
    tolerant: bool,
}

impl FlakySink {
    fn new(fail_on: Vec<(usize, std::io::ErrorKind)>, tolerant: bool) -> Self {
        Self {
            inner: InMemorySink::new(),
            attempts: 0,
            fail_on,
            tolerant,
        }
    }
}

impl FrameSink for FlakySink {
    fn begin(&mut self, cfg: SinkConfig) -> FramepackResult<()> {
        self.inner.begin(cfg)
    }

    fn push_frame(&mut self, frame: &EncodedFrame) -> FramepackResult<ManifestEntry> {
        let attempt = self.attempts;
        self.attempts += 1;
        if let Some(&(_, kind)) = self.fail_on.iter().find(|(at, _)| *at == attempt) {
            return Err(std::io::Error::new(kind, "injected").into());
        }
        self.inner.push_frame(frame)
    }

    fn end(&mut self) -> FramepackResult<()> {
        self.inner.end()
    }

    fn tolerates_frame_loss(&self) -> bool {
        self.tolerant
    }
}

fn flaky_run(cfg: &ConvertConfig, sink: &mut FlakySink) -> FramepackResult<ConvertContext> {
    sink.begin(sink_config(cfg, cfg.geometry().unwrap(), cfg.pixel_format()).unwrap())
        .unwrap();
    let mut manifest = ManifestBuilder::new();
    convert_sources(cfg, vec![source("a", 3), source("b", 2)], sink, &mut manifest)
}

#[test]
fn global_indices_run_across_sources() {
    let cfg = cfg(4);
    let (sink, manifest, ctx) = run(&cfg, vec![source("a", 3), source("b", 2)]);

    let got: Vec<_> = sink
        .frames()
        .iter()
        .map(|f| (f.index.0, f.source.as_str(), f.position))
        .collect();
    assert_eq!(
        got,
        vec![(0, "a", 0), (1, "a", 1), (2, "a", 2), (3, "b", 0), (4, "b", 1)]
    );
    assert_eq!(manifest.len(), 5);
    assert_eq!(ctx.frames_written(), 5);
    assert_eq!(ctx.sources_converted, 2);
    assert_eq!(sink.frames()[4].name, "frame-00004.bin");
}

#[test]
fn stride_keeps_every_nth_decoded_frame() {
    let cfg = ConvertConfig {
        stride: 2,
        naming: crate::config::FrameNaming::PerSource,
        ..cfg(4)
    };
    let (sink, _, _) = run(&cfg, vec![source("clip", 5)]);

    let positions: Vec<_> = sink.frames().iter().map(|f| f.position).collect();
    assert_eq!(positions, vec![0, 2, 4]);
    let indices: Vec<_> = sink.frames().iter().map(|f| f.index.0).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(sink.frames()[2].name, "clip-4.bin");
}

#[test]
fn frame_cap_applies_to_the_whole_run() {
    let cfg = ConvertConfig {
        max_frames: Some(4),
        ..cfg(4)
    };
    let (sink, manifest, ctx) = run(&cfg, vec![source("a", 3), source("b", 2), source("c", 2)]);

    assert_eq!(sink.frames().len(), 4);
    assert_eq!(manifest.len(), 4);
    assert_eq!(sink.frames()[3].source, "b");
    assert_eq!(ctx.sources_converted, 2);
}

#[test]
fn unreadable_sources_are_skipped() {
    let cfg = cfg(4);
    let (sink, _, ctx) = run(
        &cfg,
        vec![
            Err(FramepackError::decode("broken.gif")),
            source("ok", 2),
        ],
    );
    assert_eq!(ctx.sources_skipped, 1);
    assert_eq!(sink.frames().len(), 2);
    assert_eq!(sink.frames()[0].index, FrameIndex(0));
}

#[test]
fn mid_stream_decode_error_keeps_earlier_frames() {
    let cfg = cfg(4);
    let frames: crate::assets::FrameIter = Box::new(
        vec![
            Ok(solid(4, 4, 1)),
            Ok(solid(4, 4, 2)),
            Err(FramepackError::decode("truncated")),
            Ok(solid(4, 4, 3)),
        ]
        .into_iter(),
    );
    let (sink, _, _) = run(
        &cfg,
        vec![Ok(SourceFrames::new("bad", frames)), source("next", 1)],
    );

    let got: Vec<_> = sink.frames().iter().map(|f| (f.source.as_str(), f.position)).collect();
    assert_eq!(got, vec![("bad", 0), ("bad", 1), ("next", 0)]);
}

#[test]
fn frames_that_fail_to_transform_are_skipped_without_gaps() {
    let cfg = cfg(4);
    let frames = vec![solid(4, 4, 1), RgbaImage::new(0, 0), solid(4, 4, 2)];
    let (sink, _, ctx) = run(&cfg, vec![Ok(SourceFrames::from_frames("s", frames))]);

    let got: Vec<_> = sink.frames().iter().map(|f| (f.index.0, f.position)).collect();
    assert_eq!(got, vec![(0, 0), (1, 2)]);
    assert_eq!(ctx.frames_skipped, 1);
}

#[test]
fn two_by_two_rgb565_frame_is_eight_bytes() {
    let cfg = ConvertConfig {
        depth: ColorDepth::Rgb565,
        rotation: Rotation::None,
        ..cfg(2)
    };
    let (sink, _, _) = run(
        &cfg,
        vec![Ok(SourceFrames::from_frames("px", vec![solid(2, 2, 255)]))],
    );
    assert_eq!(sink.frames().len(), 1);
    assert_eq!(sink.frames()[0].data, vec![0xFF; 8]);
}

#[test]
fn transparent_pixels_encode_as_black() {
    let cfg = ConvertConfig {
        depth: ColorDepth::Rgb332,
        ..cfg(2)
    };
    let clear = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 0]));
    let (sink, _, ctx) = run(&cfg, vec![Ok(SourceFrames::from_frames("t", vec![clear]))]);
    assert_eq!(sink.frames()[0].data, vec![0u8; 4]);
    let thumb = ctx.first_frame.unwrap();
    assert_eq!(thumb.dimensions(), (2, 2));
}

#[test]
fn preview_is_the_first_frame_actually_written() {
    let cfg = cfg(4);
    let (sink, _, ctx) = run(
        &cfg,
        vec![
            Ok(SourceFrames::from_frames("empty", Vec::new())),
            Ok(SourceFrames::from_frames(
                "s",
                vec![RgbaImage::new(0, 0), solid(4, 4, 200)],
            )),
        ],
    );

    assert_eq!(sink.frames().len(), 1);
    let thumb = ctx.first_frame.unwrap();
    assert_eq!(thumb.dimensions(), (4, 4));
    assert_eq!(thumb.get_pixel(0, 0).0, [200, 200, 200]);
}

#[test]
fn worker_pool_matches_sequential_output() {
    let sequential = cfg(5);
    let parallel = ConvertConfig {
        threading: Threading {
            parallel: true,
            chunk_size: 2,
            threads: Some(3),
        },
        ..cfg(5)
    };
    let sources = || vec![source("a", 5), source("b", 3)];

    let (seq, seq_manifest, _) = run(&sequential, sources());
    let (par, par_manifest, _) = run(&parallel, sources());
    assert_eq!(seq.frames(), par.frames());
    assert_eq!(seq_manifest.entries(), par_manifest.entries());
}

#[test]
fn worker_pool_respects_frame_cap() {
    let cfg = ConvertConfig {
        max_frames: Some(3),
        threading: Threading {
            parallel: true,
            chunk_size: 8,
            threads: Some(2),
        },
        ..cfg(4)
    };
    let (sink, _, _) = run(&cfg, vec![source("a", 5)]);
    assert_eq!(sink.frames().len(), 3);
}

#[test]
fn disk_full_drops_rest_of_source_only() {
    let cfg = cfg(4);
    let mut sink = FlakySink::new(vec![(1, std::io::ErrorKind::StorageFull)], true);
    let ctx = flaky_run(&cfg, &mut sink).unwrap();

    let got: Vec<_> = sink
        .inner
        .frames()
        .iter()
        .map(|f| (f.index.0, f.source.as_str(), f.position))
        .collect();
    assert_eq!(got, vec![(0, "a", 0), (1, "b", 0), (2, "b", 1)]);
    assert_eq!(ctx.frames_skipped, 1);
}

#[test]
fn other_write_errors_skip_one_frame() {
    let cfg = cfg(4);
    let mut sink = FlakySink::new(vec![(1, std::io::ErrorKind::PermissionDenied)], true);
    flaky_run(&cfg, &mut sink).unwrap();

    let got: Vec<_> = sink.inner.frames().iter().map(|f| (f.source.as_str(), f.position)).collect();
    assert_eq!(got, vec![("a", 0), ("a", 2), ("b", 0), ("b", 1)]);
    assert_eq!(sink.inner.frames()[1].index, FrameIndex(1));
}

#[test]
fn intolerant_sink_errors_abort_the_run() {
    let cfg = cfg(4);
    let mut sink = FlakySink::new(vec![(2, std::io::ErrorKind::PermissionDenied)], false);
    let err = flaky_run(&cfg, &mut sink).unwrap_err();
    assert!(matches!(err, FramepackError::Io(_)));
}

#[test]
fn invalid_config_is_rejected_before_any_frame() {
    let bad = ConvertConfig {
        stride: 0,
        ..cfg(4)
    };
    let mut sink = InMemorySink::new();
    let mut manifest = ManifestBuilder::new();
    let err = convert_sources(&bad, vec![source("a", 1)], &mut sink, &mut manifest).unwrap_err();
    assert!(matches!(err, FramepackError::Config(_)));
    assert!(manifest.is_empty());
}
