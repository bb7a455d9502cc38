use std::{
    fs::File,
    io::{BufWriter, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::config::FrameNaming;
use crate::encode::manifest::ManifestEntry;
use crate::foundation::core::{FrameIndex, OutputGeometry, PixelFormat};
use crate::foundation::error::{FramepackError, FramepackResult};
use crate::layout::RecordLayout;

/// File name of the single-blob output.
pub const BLOB_FILE_NAME: &str = "frames.bin";

/// One frame ready to be written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Global index across every source of the run.
    pub index: FrameIndex,
    /// Base name of the source file (no extension).
    pub source: String,
    /// Position of the frame in its source's decode order.
    pub position: u64,
    /// Name under which the frame is written or listed.
    pub name: String,
    /// Encoded pixels, exactly `layout.raw_size` bytes.
    pub data: Vec<u8>,
}

/// Frame name for `naming`: `frame-00042.bin` or `<source>-<position>.bin`.
pub fn frame_name(naming: FrameNaming, index: FrameIndex, source: &str, position: u64) -> String {
    match naming {
        FrameNaming::Global => format!("frame-{:05}.bin", index.0),
        FrameNaming::PerSource => format!("{source}-{position}.bin"),
    }
}

/// Configuration handed to a [`FrameSink`] before the first frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SinkConfig {
    pub geometry: OutputGeometry,
    pub format: PixelFormat,
    pub layout: RecordLayout,
}

/// Consumer of encoded frames.
///
/// Ordering contract: `push_frame` is called with contiguous, strictly increasing global indices
/// starting at 0.
pub trait FrameSink {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> FramepackResult<()>;
    /// Write one frame and return its manifest entry.
    fn push_frame(&mut self, frame: &EncodedFrame) -> FramepackResult<ManifestEntry>;
    /// Called once after the last frame. Flushes and releases output handles.
    fn end(&mut self) -> FramepackResult<()>;
    /// `true` when a failed frame can be dropped without invalidating frames written later.
    fn tolerates_frame_loss(&self) -> bool {
        false
    }
}

fn check_frame(
    cfg: Option<&SinkConfig>,
    next: FrameIndex,
    frame: &EncodedFrame,
) -> FramepackResult<SinkConfig> {
    let Some(cfg) = cfg.copied() else {
        return Err(FramepackError::encode(
            "frame pushed before sink begin (unexpected)",
        ));
    };
    if frame.index != next {
        return Err(FramepackError::encode(format!(
            "frame index {} out of order, expected {}",
            frame.index.0, next.0
        )));
    }
    if frame.data.len() as u64 != cfg.layout.raw_size {
        return Err(FramepackError::encode(format!(
            "encoded frame '{}' is {} bytes, expected {}",
            frame.name,
            frame.data.len(),
            cfg.layout.raw_size
        )));
    }
    Ok(cfg)
}

/// Writes every frame as its own headerless file in one flat directory.
#[derive(Debug)]
pub struct PerFileSink {
    dir: PathBuf,
    cfg: Option<SinkConfig>,
    next: FrameIndex,
}

impl PerFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cfg: None,
            next: FrameIndex(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FrameSink for PerFileSink {
    fn begin(&mut self, cfg: SinkConfig) -> FramepackResult<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create output directory '{}'", self.dir.display()))?;
        self.cfg = Some(cfg);
        self.next = FrameIndex(0);
        Ok(())
    }

    fn push_frame(&mut self, frame: &EncodedFrame) -> FramepackResult<ManifestEntry> {
        check_frame(self.cfg.as_ref(), self.next, frame)?;

        let path = self.dir.join(&frame.name);
        let mut f =
            File::create(&path).with_context(|| format!("create frame '{}'", path.display()))?;
        if let Err(e) = f.write_all(&frame.data) {
            drop(f);
            // A partial file would otherwise sit next to the complete ones without a manifest line.
            if let Err(rm) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %rm, "could not remove partial frame");
            }
            return Err(anyhow::Error::new(e)
                .context(format!("write frame '{}'", path.display()))
                .into());
        }

        self.next = self.next.next();
        Ok(ManifestEntry::File(frame.name.clone()))
    }

    fn end(&mut self) -> FramepackResult<()> {
        Ok(())
    }

    fn tolerates_frame_loss(&self) -> bool {
        true
    }
}

/// Appends every frame to one `frames.bin`.
///
/// Records are back to back by default. With `pad_records` each frame is followed by zero filler up
/// to the sector-aligned record size, so the blob can be copied to a raw device verbatim.
#[derive(Debug)]
pub struct BlobSink {
    path: PathBuf,
    pad_records: bool,
    cfg: Option<SinkConfig>,
    writer: Option<BufWriter<File>>,
    written: u64,
    next: FrameIndex,
    filler: Vec<u8>,
}

impl BlobSink {
    pub fn new(path: impl Into<PathBuf>, pad_records: bool) -> Self {
        Self {
            path: path.into(),
            pad_records,
            cfg: None,
            writer: None,
            written: 0,
            next: FrameIndex(0),
            filler: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    fn record_stride(&self, layout: &RecordLayout) -> u64 {
        if self.pad_records {
            layout.padded_size
        } else {
            layout.raw_size
        }
    }
}

impl FrameSink for BlobSink {
    fn begin(&mut self, cfg: SinkConfig) -> FramepackResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output directory '{}'", parent.display()))?;
        }
        let f = File::create(&self.path)
            .with_context(|| format!("create blob '{}'", self.path.display()))?;
        self.writer = Some(BufWriter::with_capacity(1 << 20, f));
        self.filler = vec![0u8; cfg.layout.filler_bytes() as usize];
        self.cfg = Some(cfg);
        self.written = 0;
        self.next = FrameIndex(0);
        Ok(())
    }

    fn push_frame(&mut self, frame: &EncodedFrame) -> FramepackResult<ManifestEntry> {
        let cfg = check_frame(self.cfg.as_ref(), self.next, frame)?;
        let offset = frame.index.0 * self.record_stride(&cfg.layout);
        if offset != self.written {
            return Err(FramepackError::encode(format!(
                "blob offset drifted: frame {} expected at {offset}, blob holds {} bytes",
                frame.index.0, self.written
            )));
        }

        let Some(w) = self.writer.as_mut() else {
            return Err(FramepackError::encode("blob sink is already finished"));
        };
        w.write_all(&frame.data)
            .with_context(|| format!("append frame {} to '{}'", frame.index.0, self.path.display()))?;
        self.written += frame.data.len() as u64;

        if self.pad_records && !self.filler.is_empty() {
            w.write_all(&self.filler).with_context(|| {
                format!("pad frame {} in '{}'", frame.index.0, self.path.display())
            })?;
            self.written += self.filler.len() as u64;
        }

        self.next = self.next.next();
        Ok(ManifestEntry::Offset {
            name: frame.name.clone(),
            offset,
        })
    }

    fn end(&mut self) -> FramepackResult<()> {
        let Some(mut w) = self.writer.take() else {
            return Ok(());
        };
        w.flush()
            .with_context(|| format!("flush blob '{}'", self.path.display()))?;
        let f = w
            .into_inner()
            .map_err(|e| anyhow::anyhow!("flush blob '{}': {}", self.path.display(), e.error()))?;
        f.sync_all()
            .with_context(|| format!("sync blob '{}'", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), bytes = self.written, "blob closed");
        Ok(())
    }
}

/// In-memory sink for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    next: FrameIndex,
    frames: Vec<EncodedFrame>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    /// Frames in write order.
    pub fn frames(&self) -> &[EncodedFrame] {
        &self.frames
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> FramepackResult<()> {
        self.cfg = Some(cfg);
        self.next = FrameIndex(0);
        self.frames.clear();
        Ok(())
    }

    fn push_frame(&mut self, frame: &EncodedFrame) -> FramepackResult<ManifestEntry> {
        check_frame(self.cfg.as_ref(), self.next, frame)?;
        self.next = self.next.next();
        self.frames.push(frame.clone());
        Ok(ManifestEntry::File(frame.name.clone()))
    }

    fn end(&mut self) -> FramepackResult<()> {
        Ok(())
    }

    fn tolerates_frame_loss(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
