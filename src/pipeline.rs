use std::path::{Path, PathBuf};

use anyhow::Context as _;
use image::{RgbImage, RgbaImage};
use rayon::prelude::*;

use crate::{
    assets::{
        SourceFrames,
        decode::{discover_sources, open_source},
    },
    config::{ConvertConfig, OutputMode, Threading},
    encode::{
        manifest::ManifestBuilder,
        pixel::encode_frame,
        sink::{BLOB_FILE_NAME, BlobSink, EncodedFrame, FrameSink, PerFileSink, SinkConfig, frame_name},
        thumbnail::write_thumbnail,
    },
    foundation::{
        core::{FrameIndex, OutputGeometry, PixelFormat},
        error::{FramepackError, FramepackResult},
    },
    layout::{NoReservation, PretouchFiles, RecordLayout, SpaceReservation, pretouch},
    transform::{composite::flatten_over_black, geometry::fit_frame},
};

/// A frame after geometry, compositing and pixel encoding.
#[derive(Clone, Debug)]
pub struct PreparedFrame {
    /// Opaque RGB at the output geometry, kept for the thumbnail.
    pub rgb: RgbImage,
    pub data: Vec<u8>,
}

/// Transform one raw frame into its encoded bytes.
pub fn prepare_frame(raw: &RgbaImage, cfg: &ConvertConfig) -> FramepackResult<PreparedFrame> {
    let target = cfg.geometry()?;
    let fitted = fit_frame(raw, target, cfg.rotation, cfg.filter)?;
    let rgb = flatten_over_black(&fitted)?;
    let data = encode_frame(&rgb, cfg.pixel_format())?;
    Ok(PreparedFrame { rgb, data })
}

/// State carried across sources for one run.
///
/// Updated in source order only, never from worker threads.
#[derive(Debug, Default)]
pub struct ConvertContext {
    /// Index the next written frame receives.
    pub next_index: FrameIndex,
    /// First frame written in the run, composited, for the preview.
    pub first_frame: Option<RgbImage>,
    pub frames_skipped: u64,
    pub sources_converted: usize,
    pub sources_skipped: usize,
}

impl ConvertContext {
    pub fn frames_written(&self) -> u64 {
        self.next_index.0
    }

    fn cap_reached(&self, cfg: &ConvertConfig, pending: usize) -> bool {
        cfg.max_frames
            .is_some_and(|max| self.frames_written() + pending as u64 >= max)
    }
}

/// Result of a conversion run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvertSummary {
    pub frames_written: u64,
    pub frames_skipped: u64,
    pub sources_converted: usize,
    pub sources_skipped: usize,
    pub layout: RecordLayout,
    /// Frame directory (per-file mode) or blob path (single-blob mode).
    pub output: PathBuf,
    pub manifest: Option<PathBuf>,
    pub thumbnail: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SourceEnd {
    Exhausted,
    /// A write ran out of space; the rest of this source is dropped.
    OutOfSpace,
    /// `max_frames` reached; the run stops.
    CapReached,
}

/// Push every frame of `sources` through transform, encode and `sink`, recording manifest entries.
///
/// `sink.begin` must already have been called. Sources that fail to open, or fail mid-stream, are
/// logged and skipped. Sink errors are fatal unless the sink tolerates frame loss.
pub fn convert_sources<I>(
    cfg: &ConvertConfig,
    sources: I,
    sink: &mut dyn FrameSink,
    manifest: &mut ManifestBuilder,
) -> FramepackResult<ConvertContext>
where
    I: IntoIterator<Item = FramepackResult<SourceFrames>>,
{
    cfg.validate()?;
    let pool = if cfg.threading.parallel {
        Some(build_thread_pool(cfg.threading.threads)?)
    } else {
        None
    };

    let mut ctx = ConvertContext::default();
    for source in sources {
        let source = match source {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "skipping source");
                ctx.sources_skipped += 1;
                continue;
            }
        };

        let end = convert_one(cfg, source, pool.as_ref(), sink, manifest, &mut ctx)?;
        if end == SourceEnd::CapReached {
            tracing::info!(max_frames = ?cfg.max_frames, "frame cap reached");
            break;
        }
    }
    Ok(ctx)
}

#[tracing::instrument(skip_all, fields(source = %source.base_name))]
fn convert_one(
    cfg: &ConvertConfig,
    source: SourceFrames,
    pool: Option<&rayon::ThreadPool>,
    sink: &mut dyn FrameSink,
    manifest: &mut ManifestBuilder,
    ctx: &mut ConvertContext,
) -> FramepackResult<SourceEnd> {
    let SourceFrames { base_name, frames } = source;
    let batch_len = match pool {
        Some(_) => normalized_chunk_size(&cfg.threading),
        None => 1,
    };
    let stride = u64::from(cfg.stride);
    let written_before = ctx.frames_written();

    let mut batch: Vec<(u64, RgbaImage)> = Vec::with_capacity(batch_len);
    let mut end = SourceEnd::Exhausted;
    for (position, frame) in (0u64..).zip(frames) {
        let raw = match frame {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, position, "decode failed; skipping rest of source");
                break;
            }
        };
        if position % stride != 0 {
            continue;
        }

        if ctx.cap_reached(cfg, batch.len()) {
            end = write_batch(cfg, &base_name, &mut batch, pool, sink, manifest, ctx)?;
            if end != SourceEnd::Exhausted {
                break;
            }
            if ctx.cap_reached(cfg, 0) {
                end = SourceEnd::CapReached;
                break;
            }
        }

        batch.push((position, raw));
        if batch.len() >= batch_len {
            end = write_batch(cfg, &base_name, &mut batch, pool, sink, manifest, ctx)?;
            if end != SourceEnd::Exhausted {
                break;
            }
        }
    }
    if end == SourceEnd::Exhausted && !batch.is_empty() {
        end = write_batch(cfg, &base_name, &mut batch, pool, sink, manifest, ctx)?;
    }
    if end == SourceEnd::Exhausted && ctx.cap_reached(cfg, 0) {
        end = SourceEnd::CapReached;
    }

    ctx.sources_converted += 1;
    tracing::info!(
        frames = ctx.frames_written() - written_before,
        "converted source"
    );
    Ok(end)
}

/// Prepare `batch` (in parallel when a pool is given) and write the results in position order.
fn write_batch(
    cfg: &ConvertConfig,
    base_name: &str,
    batch: &mut Vec<(u64, RgbaImage)>,
    pool: Option<&rayon::ThreadPool>,
    sink: &mut dyn FrameSink,
    manifest: &mut ManifestBuilder,
    ctx: &mut ConvertContext,
) -> FramepackResult<SourceEnd> {
    let prepared: Vec<FramepackResult<PreparedFrame>> = match pool {
        Some(pool) => pool.install(|| {
            batch
                .par_iter()
                .map(|(_, raw)| prepare_frame(raw, cfg))
                .collect()
        }),
        None => batch.iter().map(|(_, raw)| prepare_frame(raw, cfg)).collect(),
    };
    let positions: Vec<u64> = batch.drain(..).map(|(position, _)| position).collect();

    let total = prepared.len();
    for (done, (position, result)) in positions.into_iter().zip(prepared).enumerate() {
        let prepared = match result {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, position, "skipping frame");
                ctx.frames_skipped += 1;
                continue;
            }
        };

        let index = ctx.next_index;
        let frame = EncodedFrame {
            index,
            source: base_name.to_string(),
            position,
            name: frame_name(cfg.naming, index, base_name, position),
            data: prepared.data,
        };
        match sink.push_frame(&frame) {
            Ok(entry) => {
                manifest.push(entry);
                ctx.next_index = index.next();
                // Preview comes from the first frame actually written, not the first decoded one:
                // a first source that yields nothing (or whose first frame is skipped) does not
                // leave the run without a thumbnail.
                if ctx.first_frame.is_none() && cfg.thumbnail_edge.is_some() {
                    ctx.first_frame = Some(prepared.rgb);
                }
            }
            Err(e) if !sink.tolerates_frame_loss() => return Err(e),
            Err(e) if e.is_resource_exhaustion() => {
                let dropped = (total - done) as u64;
                tracing::warn!(error = %e, position, dropped, "output full; skipping rest of source");
                ctx.frames_skipped += dropped;
                return Ok(SourceEnd::OutOfSpace);
            }
            Err(e) => {
                tracing::warn!(error = %e, frame = %frame.name, "write failed; skipping frame");
                ctx.frames_skipped += 1;
            }
        }
    }
    Ok(SourceEnd::Exhausted)
}

/// Convert every source in `source_dir` into `out_dir` according to `cfg`.
#[tracing::instrument(skip(cfg))]
pub fn run_convert(
    cfg: &ConvertConfig,
    source_dir: &Path,
    out_dir: &Path,
) -> FramepackResult<ConvertSummary> {
    cfg.validate()?;
    let geometry = cfg.geometry()?;
    let format = cfg.pixel_format();
    let sink_cfg = sink_config(cfg, geometry, format)?;

    let paths = discover_sources(source_dir)?;
    if paths.is_empty() {
        tracing::warn!(dir = %source_dir.display(), "no convertible sources found");
    }

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create output directory '{}'", out_dir.display()))?;
    let reservation: &dyn SpaceReservation = if cfg.pretouch_records > 0 {
        &PretouchFiles
    } else {
        &NoReservation
    };
    pretouch(reservation, out_dir, &sink_cfg.layout, cfg.pretouch_records);

    let (mut sink, output): (Box<dyn FrameSink>, PathBuf) = match cfg.mode {
        OutputMode::PerFile => (
            Box::new(PerFileSink::new(out_dir)) as Box<dyn FrameSink>,
            out_dir.to_path_buf(),
        ),
        OutputMode::SingleBlob => {
            let path = out_dir.join(BLOB_FILE_NAME);
            (Box::new(BlobSink::new(&path, cfg.pad_records)), path)
        }
    };
    sink.begin(sink_cfg)?;

    let mut manifest = ManifestBuilder::new();
    let ctx = convert_sources(
        cfg,
        paths.iter().map(|p| open_source(p)),
        sink.as_mut(),
        &mut manifest,
    )?;
    sink.end()?;

    let manifest_path = manifest.write_to_dir(out_dir)?;
    let thumbnail = match (&ctx.first_frame, cfg.thumbnail_edge) {
        (Some(frame), Some(edge)) => match write_thumbnail(frame, edge, out_dir) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(error = %e, "failed to write thumbnail");
                None
            }
        },
        _ => None,
    };

    let summary = ConvertSummary {
        frames_written: ctx.frames_written(),
        frames_skipped: ctx.frames_skipped,
        sources_converted: ctx.sources_converted,
        sources_skipped: ctx.sources_skipped,
        layout: sink_cfg.layout,
        output,
        manifest: manifest_path,
        thumbnail,
    };
    tracing::info!(
        frames = summary.frames_written,
        skipped = summary.frames_skipped,
        sources = summary.sources_converted,
        raw_size = summary.layout.raw_size,
        padded_size = summary.layout.padded_size,
        "conversion finished"
    );
    Ok(summary)
}

pub fn sink_config(
    cfg: &ConvertConfig,
    geometry: OutputGeometry,
    format: PixelFormat,
) -> FramepackResult<SinkConfig> {
    Ok(SinkConfig {
        geometry,
        format,
        layout: RecordLayout::for_frames(geometry, format, cfg.sector_size)?,
    })
}

fn build_thread_pool(threads: Option<usize>) -> FramepackResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(FramepackError::config(
            "threading 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| FramepackError::config(format!("failed to build rayon thread pool: {e}")))
}

fn normalized_chunk_size(threading: &Threading) -> usize {
    threading.chunk_size.max(1)
}

#[cfg(test)]
#[path = "../tests/unit/pipeline.rs"]
mod tests;
