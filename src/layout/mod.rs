//! Record geometry shared by the encoder and the device verifier.
//!
//! Every frame occupies one record: `raw_size` bytes of pixels followed by filler up to the next
//! sector boundary. [`RecordLayout::new`] is the only place the padded size is computed, so the
//! converter and the verifier always agree on record offsets.

use std::{
    fs::File,
    io::Write as _,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::foundation::core::{OutputGeometry, PixelFormat};
use crate::foundation::error::{FramepackError, FramepackResult};

/// Size of one frame record before and after sector alignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct RecordLayout {
    pub raw_size: u64,
    pub padded_size: u64,
    pub sector_size: u32,
}

impl RecordLayout {
    /// `padded_size = ceil(raw_size / sector_size) * sector_size`.
    pub fn new(raw_size: u64, sector_size: u32) -> FramepackResult<Self> {
        if raw_size == 0 {
            return Err(FramepackError::config("frame record size must be > 0"));
        }
        if sector_size == 0 {
            return Err(FramepackError::config("sector size must be > 0"));
        }
        let sector = u64::from(sector_size);
        let padded_size = raw_size
            .div_ceil(sector)
            .checked_mul(sector)
            .ok_or_else(|| FramepackError::config("padded record size overflows u64"))?;
        Ok(Self {
            raw_size,
            padded_size,
            sector_size,
        })
    }

    /// Layout for frames of `geometry` encoded as `format`.
    pub fn for_frames(
        geometry: OutputGeometry,
        format: PixelFormat,
        sector_size: u32,
    ) -> FramepackResult<Self> {
        Self::new(format.frame_len(geometry), sector_size)
    }

    pub fn sectors_per_record(&self) -> u64 {
        self.padded_size / u64::from(self.sector_size)
    }

    pub fn filler_bytes(&self) -> u64 {
        self.padded_size - self.raw_size
    }

    /// Byte offset of record `index` relative to the start of the record area.
    pub fn record_offset(&self, index: u64) -> u64 {
        index * self.padded_size
    }

    /// Bytes covered by `frames` padded records.
    pub fn span(&self, frames: u64) -> u64 {
        frames * self.padded_size
    }
}

/// Capability to reserve contiguous space in an output directory before encoding starts.
///
/// Implementations are best-effort. A failure is reported to the caller, which logs it and carries
/// on with the run.
pub trait SpaceReservation {
    /// Reserve room for `count` records of `layout` in `dir`. Returns the number reserved.
    fn reserve(&self, dir: &Path, layout: &RecordLayout, count: usize) -> FramepackResult<usize>;
}

/// Does nothing. Used when pre-touching is disabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoReservation;

impl SpaceReservation for NoReservation {
    fn reserve(&self, _dir: &Path, _layout: &RecordLayout, _count: usize) -> FramepackResult<usize> {
        Ok(0)
    }
}

/// Writes `count` zero-filled placeholder files of `padded_size` bytes, flushes them to disk and
/// deletes them again.
///
/// On FAT-formatted cards this nudges the allocator towards handing out contiguous clusters for
/// the real frames written straight afterwards.
#[derive(Clone, Copy, Debug, Default)]
pub struct PretouchFiles;

impl PretouchFiles {
    fn placeholder_path(dir: &Path, i: usize) -> PathBuf {
        dir.join(format!(".pretouch-{i:05}.tmp"))
    }
}

impl SpaceReservation for PretouchFiles {
    #[tracing::instrument(skip(self, layout), fields(padded_size = layout.padded_size))]
    fn reserve(&self, dir: &Path, layout: &RecordLayout, count: usize) -> FramepackResult<usize> {
        let zeros = vec![0u8; layout.padded_size.min(1 << 20) as usize];
        let mut created = Vec::with_capacity(count);

        let result = (|| -> FramepackResult<()> {
            for i in 0..count {
                let path = Self::placeholder_path(dir, i);
                let mut f = File::create(&path)
                    .with_context(|| format!("create placeholder '{}'", path.display()))?;
                created.push(path.clone());

                let mut remaining = layout.padded_size;
                while remaining > 0 {
                    let n = remaining.min(zeros.len() as u64) as usize;
                    f.write_all(&zeros[..n])
                        .with_context(|| format!("fill placeholder '{}'", path.display()))?;
                    remaining -= n as u64;
                }
                f.sync_all()
                    .with_context(|| format!("sync placeholder '{}'", path.display()))?;
            }
            Ok(())
        })();

        let reserved = created.len();
        for path in created {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove placeholder");
            }
        }
        result.map(|()| reserved)
    }
}

/// Run `strategy` and downgrade any failure to a warning. Returns the number of records reserved.
pub fn pretouch(
    strategy: &dyn SpaceReservation,
    dir: &Path,
    layout: &RecordLayout,
    count: usize,
) -> usize {
    if count == 0 {
        return 0;
    }
    match strategy.reserve(dir, layout, count) {
        Ok(n) => {
            tracing::debug!(records = n, "pre-touched output space");
            n
        }
        Err(e) => {
            tracing::warn!(error = %e, "pre-touching output space failed; continuing without it");
            0
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layout/mod.rs"]
mod tests;
