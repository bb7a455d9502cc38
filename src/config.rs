use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::core::{ColorDepth, OutputGeometry, PixelFormat, Rgb565Order, Rotation};
use crate::foundation::error::{FramepackError, FramepackResult};

/// Sector size of SD cards and most raw block devices.
pub const DEFAULT_SECTOR_SIZE: u32 = 512;
/// First sector after the partition table/boot area used by the raw frame loader.
pub const DEFAULT_START_SECTOR: u64 = 2048;
/// Side length used by the legacy converter when no size is given.
pub const DEFAULT_FRAME_SIDE: u32 = 466;
/// Upper bound for the number of placeholder records pre-touched before encoding.
pub const MAX_PRETOUCH_RECORDS: usize = 4096;

/// How encoded frames land on disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// One `.bin` file per frame in a flat directory.
    #[default]
    PerFile,
    /// All frames concatenated into `frames.bin`.
    SingleBlob,
}

/// Name given to each frame (file name in per-file mode, manifest name in blob mode).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameNaming {
    /// `frame-NNNNN.bin`, 5-digit zero-padded global index.
    #[default]
    Global,
    /// `<source base name>-<decode position>.bin`.
    PerSource,
}

/// Resampling filter handed to the image resampler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResampleFilter {
    #[default]
    Lanczos3,
    Triangle,
    Nearest,
}

impl ResampleFilter {
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::Nearest => image::imageops::FilterType::Nearest,
        }
    }
}

/// Worker-pool settings for the per-frame transform/encode stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Threading {
    pub parallel: bool,
    /// Frames handed to the pool per batch.
    pub chunk_size: usize,
    /// Pool size; `None` uses rayon's default.
    pub threads: Option<usize>,
}

impl Default for Threading {
    fn default() -> Self {
        Self {
            parallel: false,
            chunk_size: 64,
            threads: None,
        }
    }
}

/// Everything a conversion run needs. Fixed for the whole run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertConfig {
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    pub depth: ColorDepth,
    pub rgb565_order: Rgb565Order,
    pub mode: OutputMode,
    pub naming: FrameNaming,
    /// Keep every Nth decoded frame.
    pub stride: u32,
    /// Stop after this many frames in total.
    pub max_frames: Option<u64>,
    pub sector_size: u32,
    /// Write sector-padded records into `frames.bin` (blob mode only).
    pub pad_records: bool,
    /// Placeholder records to pre-touch before encoding; 0 disables it.
    pub pretouch_records: usize,
    /// Longest edge of the preview thumbnail; `None` disables it.
    pub thumbnail_edge: Option<u32>,
    pub filter: ResampleFilter,
    pub threading: Threading,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_FRAME_SIDE,
            height: DEFAULT_FRAME_SIDE,
            rotation: Rotation::None,
            depth: ColorDepth::Rgb565,
            rgb565_order: Rgb565Order::SwappedLe,
            mode: OutputMode::PerFile,
            naming: FrameNaming::Global,
            stride: 1,
            max_frames: None,
            sector_size: DEFAULT_SECTOR_SIZE,
            pad_records: false,
            pretouch_records: 0,
            thumbnail_edge: Some(128),
            filter: ResampleFilter::Lanczos3,
            threading: Threading::default(),
        }
    }
}

impl ConvertConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> FramepackResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            FramepackError::config(format!("invalid config '{}': {e}", path.display()))
        })
    }

    /// Check every field before any frame is touched.
    pub fn validate(&self) -> FramepackResult<()> {
        self.geometry()?;
        if self.stride == 0 {
            return Err(FramepackError::config("frame stride must be >= 1"));
        }
        if self.max_frames == Some(0) {
            return Err(FramepackError::config("max frames must be >= 1 when set"));
        }
        if self.sector_size == 0 {
            return Err(FramepackError::config("sector size must be > 0"));
        }
        if self.pad_records && self.mode != OutputMode::SingleBlob {
            return Err(FramepackError::config(
                "padded records are only available in single-blob mode",
            ));
        }
        if self.pretouch_records > MAX_PRETOUCH_RECORDS {
            return Err(FramepackError::config(format!(
                "pre-touch count must be <= {MAX_PRETOUCH_RECORDS}, got {}",
                self.pretouch_records
            )));
        }
        if self.thumbnail_edge == Some(0) {
            return Err(FramepackError::config(
                "thumbnail edge must be > 0 when set",
            ));
        }
        if let Some(0) = self.threading.threads {
            return Err(FramepackError::config(
                "threading 'threads' must be >= 1 when set",
            ));
        }
        Ok(())
    }

    pub fn geometry(&self) -> FramepackResult<OutputGeometry> {
        OutputGeometry::new(self.width, self.height)
    }

    pub fn pixel_format(&self) -> PixelFormat {
        PixelFormat::new(self.depth, self.rgb565_order)
    }

    /// Apply a `--size W` / `--size W H` style argument.
    pub fn set_size(&mut self, size: &[u32]) -> FramepackResult<()> {
        match *size {
            [side] => {
                self.width = side;
                self.height = side;
            }
            [w, h] => {
                self.width = w;
                self.height = h;
            }
            _ => {
                return Err(FramepackError::config(format!(
                    "size takes one (square) or two values, got {}",
                    size.len()
                )));
            }
        }
        Ok(())
    }
}

/// How frame records were physically laid out on the device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordPacking {
    /// Each unpadded reference frame sits in its own sector-aligned record on the device.
    #[default]
    Padded,
    /// The device holds a byte-for-byte copy of the reference file.
    Contiguous,
}

/// Read-back verification settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyConfig {
    pub device: PathBuf,
    pub reference: PathBuf,
    pub start_sector: u64,
    pub sector_size: u32,
    /// Size in bytes of one unpadded frame.
    pub raw_frame_size: u64,
    pub packing: RecordPacking,
    /// Bytes read from each side per step.
    pub chunk_size: usize,
    pub max_mismatches: usize,
}

impl VerifyConfig {
    pub fn new(device: impl Into<PathBuf>, reference: impl Into<PathBuf>, raw_frame_size: u64) -> Self {
        Self {
            device: device.into(),
            reference: reference.into(),
            start_sector: DEFAULT_START_SECTOR,
            sector_size: DEFAULT_SECTOR_SIZE,
            raw_frame_size,
            packing: RecordPacking::Padded,
            chunk_size: 1024 * 1024,
            max_mismatches: 10,
        }
    }

    pub fn validate(&self) -> FramepackResult<()> {
        if self.sector_size == 0 {
            return Err(FramepackError::config("sector size must be > 0"));
        }
        if self.raw_frame_size == 0 {
            return Err(FramepackError::config("frame size must be > 0"));
        }
        if self.chunk_size == 0 {
            return Err(FramepackError::config("chunk size must be > 0"));
        }
        if self.max_mismatches == 0 {
            return Err(FramepackError::config("mismatch cap must be >= 1"));
        }
        Ok(())
    }

    /// Byte offset of the verification window on the device.
    pub fn start_offset(&self) -> u64 {
        self.start_sector * u64::from(self.sector_size)
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
