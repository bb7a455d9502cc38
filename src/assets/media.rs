use std::path::Path;

use crate::{
    assets::FrameIter,
    foundation::error::{FramepackError, FramepackResult},
};

/// Frame dimensions of a video's first video stream. Every decoded frame is passed through, so
/// the stream's frame rate plays no part in conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoSourceInfo {
    pub width: u32,
    pub height: u32,
}

/// Pick the first video stream out of `ffprobe -print_format json -show_streams` output.
pub fn parse_stream_listing(json: &[u8]) -> FramepackResult<VideoSourceInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
    }

    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| FramepackError::decode(format!("ffprobe json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| FramepackError::decode("no video stream found"))?;
    let width = video
        .width
        .ok_or_else(|| FramepackError::decode("missing video width from ffprobe"))?;
    let height = video
        .height
        .ok_or_else(|| FramepackError::decode("missing video height from ffprobe"))?;
    Ok(VideoSourceInfo { width, height })
}

#[cfg(feature = "media-ffmpeg")]
pub fn probe_video(source_path: &Path) -> FramepackResult<VideoSourceInfo> {
    let out = std::process::Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_streams"])
        .arg(source_path)
        .output()
        .map_err(|e| FramepackError::decode(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(FramepackError::decode(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    parse_stream_listing(&out.stdout)
}

#[cfg(not(feature = "media-ffmpeg"))]
pub fn probe_video(_source_path: &Path) -> FramepackResult<VideoSourceInfo> {
    Err(FramepackError::decode(
        "video sources require the 'media-ffmpeg' feature",
    ))
}

/// Stream every frame of a video as RGBA8 through the system `ffmpeg`.
///
/// Frames are read one at a time from the decoder's stdout; the child process is reaped when the
/// iterator is dropped.
#[cfg(feature = "media-ffmpeg")]
pub fn open_video(source_path: &Path) -> FramepackResult<FrameIter> {
    use std::process::{Command, Stdio};

    let info = probe_video(source_path)?;
    let frame_len = info.width as usize * info.height as usize * 4;
    if frame_len == 0 {
        return Err(FramepackError::decode(
            "decoded video frame size is zero (invalid source dimensions)",
        ));
    }

    let mut child = Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(source_path)
        .args(["-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| FramepackError::decode(format!("failed to spawn ffmpeg: {e}")))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| FramepackError::decode("failed to open ffmpeg stdout (unexpected)"))?;

    Ok(Box::new(FfmpegFrames {
        child,
        stdout: std::io::BufReader::with_capacity(frame_len, stdout),
        info,
        frame_len,
        done: false,
    }))
}

#[cfg(not(feature = "media-ffmpeg"))]
pub fn open_video(source_path: &Path) -> FramepackResult<FrameIter> {
    probe_video(source_path).map(|_| -> FrameIter { Box::new(std::iter::empty()) })
}

#[cfg(feature = "media-ffmpeg")]
struct FfmpegFrames {
    child: std::process::Child,
    stdout: std::io::BufReader<std::process::ChildStdout>,
    info: VideoSourceInfo,
    frame_len: usize,
    done: bool,
}

#[cfg(feature = "media-ffmpeg")]
impl Iterator for FfmpegFrames {
    type Item = FramepackResult<crate::assets::RawFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        use std::io::Read as _;

        if self.done {
            return None;
        }

        let mut buf = vec![0u8; self.frame_len];
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(FramepackError::decode(format!(
                        "read ffmpeg output: {e}"
                    ))));
                }
            }
        }

        if filled == 0 {
            self.done = true;
            return match self.child.wait() {
                Ok(status) if status.success() => None,
                Ok(status) => Some(Err(FramepackError::decode(format!(
                    "ffmpeg exited with status {status}"
                )))),
                Err(e) => Some(Err(FramepackError::decode(format!(
                    "failed to wait for ffmpeg: {e}"
                )))),
            };
        }
        if filled < buf.len() {
            self.done = true;
            return Some(Err(FramepackError::decode(format!(
                "truncated video frame: got {filled} bytes, expected {}",
                self.frame_len
            ))));
        }

        Some(
            image::RgbaImage::from_raw(self.info.width, self.info.height, buf)
                .ok_or_else(|| FramepackError::decode("video frame buffer size mismatch")),
        )
    }
}

#[cfg(feature = "media-ffmpeg")]
impl Drop for FfmpegFrames {
    fn drop(&mut self) {
        if !self.done {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}
