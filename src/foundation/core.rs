use crate::foundation::error::{FramepackError, FramepackResult};

/// Global 0-based frame index, contiguous across every converted source.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

impl FrameIndex {
    /// Index following `self`.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Fixed output size every frame is cropped and resized to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OutputGeometry {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl OutputGeometry {
    /// Create a validated geometry with both sides > 0.
    pub fn new(width: u32, height: u32) -> FramepackResult<Self> {
        let g = Self { width, height };
        g.validate()?;
        Ok(g)
    }

    /// Square geometry `side x side`.
    pub fn square(side: u32) -> FramepackResult<Self> {
        Self::new(side, side)
    }

    pub fn validate(&self) -> FramepackResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FramepackError::config(format!(
                "output size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Rotation applied to a source frame before crop/resize.
///
/// Angles follow the usual image-editing convention: positive is counter-clockwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rotation {
    #[default]
    None,
    Ccw90,
    Half,
    Cw90,
}

impl Rotation {
    /// Parse a rotation in degrees. Only `0`, `90`, `180` and `-90` (or `270`) are accepted.
    pub fn from_degrees(deg: i32) -> FramepackResult<Self> {
        match deg {
            0 => Ok(Self::None),
            90 => Ok(Self::Ccw90),
            180 | -180 => Ok(Self::Half),
            -90 | 270 => Ok(Self::Cw90),
            other => Err(FramepackError::config(format!(
                "rotation must be one of 0, 90, 180, -90 degrees, got {other}"
            ))),
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Ccw90 => 90,
            Self::Half => 180,
            Self::Cw90 => -90,
        }
    }

    /// `true` when the rotated canvas swaps width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Ccw90 | Self::Cw90)
    }
}

/// Pixel depth supported by the display controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ColorDepth {
    /// 8-bit RGB332.
    Rgb332,
    /// 16-bit RGB565.
    Rgb565,
}

impl ColorDepth {
    pub fn from_bits(bits: u8) -> FramepackResult<Self> {
        match bits {
            8 => Ok(Self::Rgb332),
            16 => Ok(Self::Rgb565),
            other => Err(FramepackError::config(format!(
                "color depth must be 8 or 16 bits, got {other}"
            ))),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Self::Rgb332 => 8,
            Self::Rgb565 => 16,
        }
    }

    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgb332 => 1,
            Self::Rgb565 => 2,
        }
    }
}

impl TryFrom<i32> for Rotation {
    type Error = FramepackError;

    fn try_from(deg: i32) -> FramepackResult<Self> {
        Self::from_degrees(deg)
    }
}

impl From<Rotation> for i32 {
    fn from(rotation: Rotation) -> i32 {
        rotation.degrees()
    }
}

impl TryFrom<u8> for ColorDepth {
    type Error = FramepackError;

    fn try_from(bits: u8) -> FramepackResult<Self> {
        Self::from_bits(bits)
    }
}

impl From<ColorDepth> for u8 {
    fn from(depth: ColorDepth) -> u8 {
        depth.bits()
    }
}

/// Wire order of a packed RGB565 word.
///
/// Controller revisions disagree on this, so the order is always chosen explicitly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rgb565Order {
    /// Legacy CO5300 path: swap the high/low bytes of the word, then store it little-endian.
    #[default]
    SwappedLe,
    /// High byte first, no extra swap.
    BigEndian,
    /// Low byte first, no swap (host order on little-endian MCUs).
    LittleEndian,
}

/// Concrete pixel encoding written for every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb332,
    Rgb565(Rgb565Order),
}

impl PixelFormat {
    pub fn new(depth: ColorDepth, order: Rgb565Order) -> Self {
        match depth {
            ColorDepth::Rgb332 => Self::Rgb332,
            ColorDepth::Rgb565 => Self::Rgb565(order),
        }
    }

    pub fn depth(self) -> ColorDepth {
        match self {
            Self::Rgb332 => ColorDepth::Rgb332,
            Self::Rgb565(_) => ColorDepth::Rgb565,
        }
    }

    pub fn bytes_per_pixel(self) -> u32 {
        self.depth().bytes_per_pixel()
    }

    /// Size in bytes of one encoded frame of `geometry`.
    pub fn frame_len(self, geometry: OutputGeometry) -> u64 {
        geometry.pixel_count() * u64::from(self.bytes_per_pixel())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
