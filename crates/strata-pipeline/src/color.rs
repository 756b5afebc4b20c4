//! Display colors and brightness math shared by the partitioner and
//! the mask builder.
//!
//! Luma uses the Rec. 601 weights `0.299*R + 0.587*G + 0.114*B`. Every
//! stage that compares brightness goes through [`luma`], so band bounds,
//! histogram bins and the single-band threshold all agree.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An 8-bit sRGB display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Pure black.
    pub const BLACK: Self = Self::new(0, 0, 0);
    /// Pure white.
    pub const WHITE: Self = Self::new(255, 255, 255);

    /// Create a color from its channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Squared Euclidean distance in RGB space.
    #[must_use]
    pub fn distance_sq(self, other: Self) -> u32 {
        let dr = i32::from(self.r) - i32::from(other.r);
        let dg = i32::from(self.g) - i32::from(other.g);
        let db = i32::from(self.b) - i32::from(other.b);
        dr.unsigned_abs().pow(2) + dg.unsigned_abs().pow(2) + db.unsigned_abs().pow(2)
    }

    /// Convert HSL (hue in degrees, saturation and lightness in `0..=1`)
    /// to RGB.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::many_single_char_names
    )]
    pub fn from_hsl(hue: f64, saturation: f64, lightness: f64) -> Self {
        let h = hue.rem_euclid(360.0) / 60.0;
        let c = (1.0 - 2.0f64.mul_add(lightness, -1.0).abs()) * saturation;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let m = lightness - c / 2.0;
        let (r, g, b) = match h {
            h if h < 1.0 => (c, x, 0.0),
            h if h < 2.0 => (x, c, 0.0),
            h if h < 3.0 => (0.0, c, x),
            h if h < 4.0 => (0.0, x, c),
            h if h < 5.0 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let to_u8 = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Self::new(to_u8(r), to_u8(g), to_u8(b))
    }

    /// Fallback color for band `index` of `count`: evenly spaced hues at
    /// 90% saturation, 40% lightness.
    #[must_use]
    pub fn band_hue(index: usize, count: usize) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let hue = (360.0 / count.max(1) as f64 * index as f64).round();
        Self::from_hsl(hue, 0.9, 0.4)
    }

    /// `#rrggbb` form used for SVG `fill` attributes.
    #[must_use]
    pub fn to_hex(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl From<image::Rgb<u8>> for Rgb {
    fn from(px: image::Rgb<u8>) -> Self {
        let [r, g, b] = px.0;
        Self::new(r, g, b)
    }
}

impl From<Rgb> for image::Rgb<u8> {
    fn from(c: Rgb) -> Self {
        Self([c.r, c.g, c.b])
    }
}

/// Perceptual brightness of a pixel in `0.0..=255.0`.
#[must_use]
pub fn luma(px: image::Rgb<u8>) -> f32 {
    let [r, g, b] = px.0;
    0.114f32.mul_add(
        f32::from(b),
        0.299f32.mul_add(f32::from(r), 0.587 * f32::from(g)),
    )
}

/// Luma rounded to the nearest histogram bin.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn luma_bin(px: image::Rgb<u8>) -> u8 {
    luma(px).round().clamp(0.0, 255.0) as u8
}

/// Running per-channel sum used to average band members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorAccumulator {
    sum: [u64; 3],
    count: u64,
}

impl ColorAccumulator {
    /// Add one pixel.
    pub fn push(&mut self, px: image::Rgb<u8>) {
        for (s, &c) in self.sum.iter_mut().zip(&px.0) {
            *s += u64::from(c);
        }
        self.count += 1;
    }

    /// Number of pixels added.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Rounded mean color, or `None` if nothing was added.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn mean(&self) -> Option<Rgb> {
        if self.count == 0 {
            return None;
        }
        let avg = |s: u64| ((s + self.count / 2) / self.count).min(255) as u8;
        Some(Rgb::new(avg(self.sum[0]), avg(self.sum[1]), avg(self.sum[2])))
    }
}
