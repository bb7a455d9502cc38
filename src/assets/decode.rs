use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use image::AnimationDecoder as _;

use crate::{
    assets::{SourceFrames, media},
    foundation::error::{FramepackError, FramepackResult},
};

/// Kind of source file, derived from its extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Animated GIF, decoded in-process.
    Gif,
    /// Single still image (PNG/JPEG/BMP), yields one frame.
    Still,
    /// Video container, decoded by the system `ffmpeg`.
    Video,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "gif" => Some(Self::Gif),
            "png" | "jpg" | "jpeg" | "bmp" => Some(Self::Still),
            "mp4" | "mov" | "mkv" | "webm" => Some(Self::Video),
            _ => None,
        }
    }
}

/// List convertible sources directly inside `dir`, sorted by file name.
///
/// Sorting makes global frame indices independent of the filesystem's directory order.
#[tracing::instrument]
pub fn discover_sources(dir: &Path) -> FramepackResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("read source directory '{}'", dir.display()))?;

    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("list source directory '{}'", dir.display()))?;
        let path = entry.path();
        if !path.is_file() || SourceKind::from_path(&path).is_none() {
            continue;
        }
        out.push(path);
    }
    out.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    tracing::debug!(count = out.len(), "discovered sources");
    Ok(out)
}

/// Base name used in per-source frame names.
pub fn source_base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".to_string())
}

/// Open `path` and return its frames in decode order.
pub fn open_source(path: &Path) -> FramepackResult<SourceFrames> {
    let kind = SourceKind::from_path(path).ok_or_else(|| {
        FramepackError::decode(format!("unsupported source type '{}'", path.display()))
    })?;
    let base_name = source_base_name(path);
    match kind {
        SourceKind::Gif => decode_gif(path).map(|frames| SourceFrames::new(base_name, frames)),
        SourceKind::Still => {
            decode_still(path).map(|frame| SourceFrames::from_frames(base_name, vec![frame]))
        }
        SourceKind::Video => {
            media::open_video(path).map(|frames| SourceFrames::new(base_name, frames))
        }
    }
}

fn decode_gif(path: &Path) -> FramepackResult<crate::assets::FrameIter> {
    let f = File::open(path)
        .map_err(|e| FramepackError::decode(format!("open '{}': {e}", path.display())))?;
    let decoder = image::codecs::gif::GifDecoder::new(BufReader::new(f))
        .map_err(|e| FramepackError::decode(format!("read gif '{}': {e}", path.display())))?;

    let display = path.display().to_string();
    Ok(Box::new(decoder.into_frames().map(move |frame| {
        frame
            .map(|f| f.into_buffer())
            .map_err(|e| FramepackError::decode(format!("decode gif frame in '{display}': {e}")))
    })))
}

fn decode_still(path: &Path) -> FramepackResult<crate::assets::RawFrame> {
    let img = image::open(path)
        .map_err(|e| FramepackError::decode(format!("decode image '{}': {e}", path.display())))?;
    Ok(img.to_rgba8())
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
