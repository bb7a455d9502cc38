pub mod decode;
pub mod media;

use image::RgbaImage;

use crate::foundation::error::FramepackResult;

/// One decoded source frame: straight-alpha RGBA8, row-major, tightly packed.
pub type RawFrame = RgbaImage;

/// Boxed iterator over the frames of one source, in decode order.
pub type FrameIter = Box<dyn Iterator<Item = FramepackResult<RawFrame>>>;

/// The decoded frame sequence of one source file.
pub struct SourceFrames {
    /// File stem, used for per-source frame names.
    pub base_name: String,
    pub frames: FrameIter,
}

impl SourceFrames {
    pub fn new(base_name: impl Into<String>, frames: FrameIter) -> Self {
        Self {
            base_name: base_name.into(),
            frames,
        }
    }

    /// Source backed by frames already in memory.
    pub fn from_frames(base_name: impl Into<String>, frames: Vec<RawFrame>) -> Self {
        Self::new(base_name, Box::new(frames.into_iter().map(Ok)))
    }
}

impl std::fmt::Debug for SourceFrames {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFrames")
            .field("base_name", &self.base_name)
            .finish_non_exhaustive()
    }
}
