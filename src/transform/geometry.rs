use image::{RgbaImage, imageops};

use crate::config::ResampleFilter;
use crate::foundation::core::{OutputGeometry, Rotation};
use crate::foundation::error::{FramepackError, FramepackResult};

/// Intermediate size a source is scaled to before the center crop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoverPlan {
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub crop_x: u32,
    pub crop_y: u32,
}

/// Plan a "cover" fit of `src_w x src_h` into `target`: scale until the target is filled, then
/// crop the overflowing axis around the center.
///
/// A source that is relatively wider than the target is scaled to the target height; anything
/// else (equal aspect included) is scaled to the target width. Aspect ratios are compared by
/// cross-multiplication so equal ratios never depend on float rounding.
pub fn plan_cover(src_w: u32, src_h: u32, target: OutputGeometry) -> FramepackResult<CoverPlan> {
    target.validate()?;
    if src_w == 0 || src_h == 0 {
        return Err(FramepackError::decode(format!(
            "source frame has empty dimensions {src_w}x{src_h}"
        )));
    }

    let (sw, sh) = (u64::from(src_w), u64::from(src_h));
    let (tw, th) = (u64::from(target.width), u64::from(target.height));

    let (scaled_width, scaled_height) = if sw * th > tw * sh {
        // floor(aspect * H) >= W because sw/sh > tw/th.
        ((sw * th / sh).max(tw), th)
    } else {
        (tw, (tw * sh / sw).max(th))
    };

    let scaled_width = to_u32(scaled_width)?;
    let scaled_height = to_u32(scaled_height)?;
    Ok(CoverPlan {
        scaled_width,
        scaled_height,
        crop_x: center_offset(scaled_width, target.width),
        crop_y: center_offset(scaled_height, target.height),
    })
}

/// Left/top offset that centers `inner` inside `outer` (floor division of the overflow).
pub fn center_offset(outer: u32, inner: u32) -> u32 {
    outer.saturating_sub(inner) / 2
}

/// Rotate with "expand" semantics: the canvas grows to hold the whole rotated image.
pub fn rotate(frame: &RgbaImage, rotation: Rotation) -> RgbaImage {
    match rotation {
        Rotation::None => frame.clone(),
        // imageops rotates clockwise.
        Rotation::Ccw90 => imageops::rotate270(frame),
        Rotation::Half => imageops::rotate180(frame),
        Rotation::Cw90 => imageops::rotate90(frame),
    }
}

/// Rotate, scale and center-crop `frame` to exactly `target`.
pub fn fit_frame(
    frame: &RgbaImage,
    target: OutputGeometry,
    rotation: Rotation,
    filter: ResampleFilter,
) -> FramepackResult<RgbaImage> {
    let rotated;
    let src = if rotation == Rotation::None {
        frame
    } else {
        rotated = rotate(frame, rotation);
        &rotated
    };

    let plan = plan_cover(src.width(), src.height(), target)?;
    let scaled = if (plan.scaled_width, plan.scaled_height) == src.dimensions() {
        src.clone()
    } else {
        imageops::resize(
            src,
            plan.scaled_width,
            plan.scaled_height,
            filter.to_image_filter(),
        )
    };

    if (plan.scaled_width, plan.scaled_height) == (target.width, target.height) {
        return Ok(scaled);
    }
    Ok(imageops::crop_imm(&scaled, plan.crop_x, plan.crop_y, target.width, target.height).to_image())
}

fn to_u32(v: u64) -> FramepackResult<u32> {
    u32::try_from(v)
        .map_err(|_| FramepackError::encode(format!("scaled dimension {v} does not fit in u32")))
}

#[cfg(test)]
#[path = "../../tests/unit/transform/geometry.rs"]
mod tests;
