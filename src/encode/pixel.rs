use image::RgbImage;

use crate::foundation::core::{PixelFormat, Rgb565Order};
use crate::foundation::error::{FramepackError, FramepackResult};

/// Pack one RGB888 pixel as RGB332: `rrrgggbb`.
pub fn pack_rgb332(r: u8, g: u8, b: u8) -> u8 {
    ((r >> 5) << 5) | ((g >> 5) << 2) | (b >> 6)
}

/// Expand an RGB332 byte back to the truncated channel values (low bits zero).
pub fn unpack_rgb332(px: u8) -> [u8; 3] {
    [px & 0xE0, (px << 3) & 0xE0, (px << 6) & 0xC0]
}

/// Pack one RGB888 pixel as an RGB565 word: `rrrrrggggggbbbbb`.
pub fn pack_rgb565(r: u8, g: u8, b: u8) -> u16 {
    (u16::from(r >> 3) << 11) | (u16::from(g >> 2) << 5) | u16::from(b >> 3)
}

/// Expand an RGB565 word back to the truncated channel values (low bits zero).
pub fn unpack_rgb565(word: u16) -> [u8; 3] {
    [
        ((word >> 11) as u8) << 3,
        (((word >> 5) & 0x3F) as u8) << 2,
        ((word & 0x1F) as u8) << 3,
    ]
}

/// Bytes of one RGB565 word in wire order.
pub fn rgb565_bytes(word: u16, order: Rgb565Order) -> [u8; 2] {
    match order {
        Rgb565Order::SwappedLe => word.swap_bytes().to_le_bytes(),
        Rgb565Order::BigEndian => word.to_be_bytes(),
        Rgb565Order::LittleEndian => word.to_le_bytes(),
    }
}

/// Read one RGB565 word back from its wire bytes.
pub fn rgb565_from_bytes(bytes: [u8; 2], order: Rgb565Order) -> u16 {
    match order {
        Rgb565Order::SwappedLe => u16::from_le_bytes(bytes).swap_bytes(),
        Rgb565Order::BigEndian => u16::from_be_bytes(bytes),
        Rgb565Order::LittleEndian => u16::from_le_bytes(bytes),
    }
}

/// Encode tightly packed, row-major RGB8 into `format`.
///
/// The output is exactly `pixels * bytes_per_pixel` long with no row padding.
pub fn encode_rgb8(rgb: &[u8], format: PixelFormat) -> FramepackResult<Vec<u8>> {
    if !rgb.len().is_multiple_of(3) {
        return Err(FramepackError::encode(format!(
            "rgb8 buffer length {} is not a multiple of 3",
            rgb.len()
        )));
    }

    let pixels = rgb.len() / 3;
    let mut out = Vec::with_capacity(pixels * format.bytes_per_pixel() as usize);
    match format {
        PixelFormat::Rgb332 => {
            out.extend(rgb.chunks_exact(3).map(|p| pack_rgb332(p[0], p[1], p[2])));
        }
        PixelFormat::Rgb565(order) => {
            for p in rgb.chunks_exact(3) {
                out.extend_from_slice(&rgb565_bytes(pack_rgb565(p[0], p[1], p[2]), order));
            }
        }
    }
    Ok(out)
}

/// Encode an opaque frame into `format`.
pub fn encode_frame(frame: &RgbImage, format: PixelFormat) -> FramepackResult<Vec<u8>> {
    let (w, h) = frame.dimensions();
    let expected = u64::from(w) * u64::from(h) * 3;
    if frame.as_raw().len() as u64 != expected {
        return Err(FramepackError::encode(format!(
            "frame buffer holds {} bytes, expected {expected} for {w}x{h}",
            frame.as_raw().len()
        )));
    }
    encode_rgb8(frame.as_raw(), format)
}

/// Decode an encoded frame back to RGB8 (truncated precision). Used for previews and checks.
pub fn decode_to_rgb8(data: &[u8], format: PixelFormat) -> FramepackResult<Vec<u8>> {
    match format {
        PixelFormat::Rgb332 => Ok(data.iter().flat_map(|&px| unpack_rgb332(px)).collect()),
        PixelFormat::Rgb565(order) => {
            if !data.len().is_multiple_of(2) {
                return Err(FramepackError::encode(format!(
                    "rgb565 buffer length {} is odd",
                    data.len()
                )));
            }
            Ok(data
                .chunks_exact(2)
                .flat_map(|b| unpack_rgb565(rgb565_from_bytes([b[0], b[1]], order)))
                .collect())
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/pixel.rs"]
mod tests;
