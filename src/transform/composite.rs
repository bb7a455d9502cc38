use image::{RgbImage, RgbaImage};

use crate::foundation::error::{FramepackError, FramepackResult};

/// Opaque background every frame is flattened onto.
pub const BACKGROUND_RGB: [u8; 3] = [0, 0, 0];

/// Composite straight-alpha RGBA over an opaque black canvas and drop the alpha channel.
pub fn flatten_over_black(frame: &RgbaImage) -> FramepackResult<RgbImage> {
    let (w, h) = frame.dimensions();
    let mut out = RgbImage::new(w, h);
    flatten_to_opaque_rgb8(&mut out, frame.as_raw(), BACKGROUND_RGB)?;
    Ok(out)
}

/// Alpha-over of each straight RGBA8 pixel in `src` onto `bg`, writing tightly packed RGB8.
pub fn flatten_to_opaque_rgb8(dst: &mut [u8], src: &[u8], bg: [u8; 3]) -> FramepackResult<()> {
    if !src.len().is_multiple_of(4) || dst.len() / 3 != src.len() / 4 || !dst.len().is_multiple_of(3)
    {
        return Err(FramepackError::encode(
            "flatten_to_opaque_rgb8 expects rgba8 input and an rgb8 output of the same pixel count",
        ));
    }

    let bg = bg.map(u16::from);
    for (d, s) in dst.chunks_exact_mut(3).zip(src.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(&s[..3]);
            continue;
        }

        let inv = 255 - a;
        for i in 0..3 {
            let c = mul_div255(u16::from(s[i]), a) + mul_div255(bg[i], inv);
            d[i] = c.min(255) as u8;
        }
    }
    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

#[cfg(test)]
#[path = "../../tests/unit/transform/composite.rs"]
mod tests;
