use crate::error::{ChalkError, ChalkResult};

pub use kurbo::{Affine, BezPath, Point, Rect, Vec2};

/// Logical drawing surface dimensions in pixels.
///
/// Timelines are authored against a fixed 800x500 coordinate space; hosts
/// embed and scale the rendered frame, the engine never does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// The slide coordinate space every timeline is authored in.
    pub const SLIDE: Canvas = Canvas {
        width: 800,
        height: 500,
    };

    pub fn new(width: u32, height: u32) -> ChalkResult<Self> {
        if width == 0 || height == 0 {
            return Err(ChalkError::validation("canvas width/height must be > 0"));
        }
        Ok(Self { width, height })
    }
}

/// Straight (non-premultiplied) RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for Rgba8 {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Rgba8 {
    pub const WHITE: Rgba8 = Rgba8::new(255, 255, 255, 255);

    /// Dark slate board background every frame is cleared to.
    pub const BOARD: Rgba8 = Rgba8::new(15, 23, 42, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse a CSS hex color: `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(s: &str) -> ChalkResult<Self> {
        let hex = s.trim().strip_prefix('#').ok_or_else(|| {
            ChalkError::validation(format!("color '{s}' must start with '#'"))
        })?;

        let nibble = |c: u8| -> ChalkResult<u8> {
            match c {
                b'0'..=b'9' => Ok(c - b'0'),
                b'a'..=b'f' => Ok(c - b'a' + 10),
                b'A'..=b'F' => Ok(c - b'A' + 10),
                _ => Err(ChalkError::validation(format!(
                    "color '{s}' has a non-hex digit"
                ))),
            }
        };
        let byte = |hi: u8, lo: u8| -> ChalkResult<u8> { Ok((nibble(hi)? << 4) | nibble(lo)?) };

        let b = hex.as_bytes();
        match b.len() {
            3 => Ok(Self::new(
                byte(b[0], b[0])?,
                byte(b[1], b[1])?,
                byte(b[2], b[2])?,
                255,
            )),
            6 => Ok(Self::new(
                byte(b[0], b[1])?,
                byte(b[2], b[3])?,
                byte(b[4], b[5])?,
                255,
            )),
            8 => Ok(Self::new(
                byte(b[0], b[1])?,
                byte(b[2], b[3])?,
                byte(b[4], b[5])?,
                byte(b[6], b[7])?,
            )),
            n => Err(ChalkError::validation(format!(
                "color '{s}' has unsupported hex length {n}"
            ))),
        }
    }

    /// Copy with a scaled alpha channel.
    pub fn with_alpha(self, alpha: f64) -> Self {
        let a = (f64::from(self.a) * alpha.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }
}

/// Clamp into the unit interval. NaN clamps to 0.
pub fn clamp01(t: f64) -> f64 {
    if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) }
}

/// One fully rendered frame, premultiplied RGBA8, row-major.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}
