use std::path::{Path, PathBuf};

use anyhow::Context as _;
use image::{RgbImage, imageops};

use crate::foundation::error::FramepackResult;

/// File name of the preview written next to the frames.
pub const THUMBNAIL_FILE_NAME: &str = "thumbnail.jpg";

/// Size of the preview: the longest edge becomes `max_edge`, never upscaled.
pub fn thumbnail_size(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_edge || longest == 0 {
        return (width, height);
    }
    let scale = |v: u32| ((u64::from(v) * u64::from(max_edge)) / u64::from(longest)).max(1) as u32;
    (scale(width), scale(height))
}

/// Write a JPEG preview of `frame` into `dir`.
pub fn write_thumbnail(frame: &RgbImage, max_edge: u32, dir: &Path) -> FramepackResult<PathBuf> {
    let (w, h) = thumbnail_size(frame.width(), frame.height(), max_edge);
    let preview = if (w, h) == frame.dimensions() {
        frame.clone()
    } else {
        imageops::resize(frame, w, h, imageops::FilterType::Triangle)
    };

    let path = dir.join(THUMBNAIL_FILE_NAME);
    preview
        .save_with_format(&path, image::ImageFormat::Jpeg)
        .with_context(|| format!("write thumbnail '{}'", path.display()))?;
    Ok(path)
}
