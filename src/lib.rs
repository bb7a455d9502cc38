//! framepack turns animations into raw frame records for small display controllers.
//!
//! - Decode sources (GIF, stills, optionally video through `ffmpeg`)
//! - Fit every frame to the panel, flatten alpha onto black and pack it as RGB332 or RGB565
//! - Write per-frame files or one blob, plus a manifest and a preview thumbnail
//! - Verify frame records read back from a raw block device
#![forbid(unsafe_code)]

mod foundation;

/// Source discovery and frame decoding.
pub mod assets;
/// Run configuration.
pub mod config;
pub mod encode;
pub mod layout;
/// Conversion driver.
pub mod pipeline;
pub mod transform;
pub mod verify;

pub use crate::foundation::core::{
    ColorDepth, FrameIndex, OutputGeometry, PixelFormat, Rgb565Order, Rotation,
};
pub use crate::foundation::error::{FramepackError, FramepackResult};

pub use crate::assets::{FrameIter, RawFrame, SourceFrames};
pub use crate::config::{
    ConvertConfig, FrameNaming, OutputMode, RecordPacking, ResampleFilter, Threading, VerifyConfig,
};
pub use crate::encode::manifest::{ManifestBuilder, ManifestEntry};
pub use crate::encode::sink::{
    BlobSink, EncodedFrame, FrameSink, InMemorySink, PerFileSink, SinkConfig,
};
pub use crate::layout::RecordLayout;
pub use crate::pipeline::{ConvertSummary, convert_sources, run_convert};
pub use crate::verify::{Mismatch, VerifyReport, verify_device, verify_region};
