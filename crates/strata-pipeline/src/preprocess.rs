//! Decode, flatten, resize and denoise the uploaded image.
//!
//! Raw bytes in, an 8-bit sRGB working raster out. Everything after this
//! stage operates on the (much smaller) working resolution, so the long
//! side is capped at [`PreprocessConfig::long_side`] but never enlarged.

use std::fmt;
use std::str::FromStr;

use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::types::{PipelineError, PreprocessConfig};

/// Resampling filter used when shrinking to the working resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl ResizeFilter {
    /// Every filter, in quality order.
    pub const ALL: [Self; 5] = [
        Self::Nearest,
        Self::Triangle,
        Self::CatmullRom,
        Self::Gaussian,
        Self::Lanczos3,
    ];

    const fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Triangle => "triangle",
            Self::CatmullRom => "catmull-rom",
            Self::Gaussian => "gaussian",
            Self::Lanczos3 => "lanczos3",
        }
    }
}

impl fmt::Display for ResizeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResizeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown resize filter: {s}"))
    }
}

/// Size of the working raster for a `width` x `height` input whose long
/// side should become `long_side`.
///
/// The longer side maps to exactly `long_side`; the shorter side is
/// scaled proportionally and rounded, never below 1. Images already
/// within the limit keep their size.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless
)]
pub fn target_dimensions(width: u32, height: u32, long_side: u32) -> (u32, u32) {
    let long_side = long_side.max(1);
    if width.max(height) <= long_side {
        return (width, height);
    }
    let scale_short = |short: u32, long: u32| -> u32 {
        let scaled = (f64::from(short) * f64::from(long_side) / f64::from(long)).round();
        (scaled as u32).max(1)
    };
    if width >= height {
        (long_side, scale_short(height, width))
    } else {
        (scale_short(width, height), long_side)
    }
}

/// Composite any alpha channel over white and convert to 8-bit RGB.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn flatten_alpha(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = u32::from(a);
        let over_white = |c: u8| ((u32::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        image::Rgb([over_white(r), over_white(g), over_white(b)])
    })
}

/// Apply a Gaussian blur to each RGB channel independently.
///
/// Non-positive sigma values return the image unchanged, since
/// `imageproc` panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur_rgb(image: &RgbImage, sigma: f32) -> RgbImage {
    if sigma <= 0.0 {
        return image.clone();
    }
    let (w, h) = image.dimensions();
    let blurred: [GrayImage; 3] = std::array::from_fn(|c| {
        let channel = GrayImage::from_fn(w, h, |x, y| image::Luma([image.get_pixel(x, y).0[c]]));
        imageproc::filter::gaussian_blur_f32(&channel, sigma)
    });
    RgbImage::from_fn(w, h, |x, y| {
        image::Rgb([
            blurred[0].get_pixel(x, y).0[0],
            blurred[1].get_pixel(x, y).0[0],
            blurred[2].get_pixel(x, y).0[0],
        ])
    })
}

/// Decode `bytes` and produce the working raster.
///
/// Steps: decode, flatten alpha over white, shrink so the long side is
/// at most `config.long_side`, optional Gaussian blur, then a median
/// filter of `config.median_radius` to knock out JPEG speckle.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the format is unrecognized
/// or the data is corrupt.
pub fn normalize(bytes: &[u8], config: &PreprocessConfig) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let decoded = image::load_from_memory(bytes)?;
    let (src_w, src_h) = (decoded.width(), decoded.height());
    let (w, h) = target_dimensions(src_w, src_h, config.long_side);

    let rgb = flatten_alpha(&decoded);
    drop(decoded);

    let resized = if (w, h) == (src_w, src_h) {
        rgb
    } else {
        image::imageops::resize(&rgb, w, h, config.resize_filter.to_image_filter())
    };

    let blurred = gaussian_blur_rgb(&resized, config.blur_sigma);
    let filtered = if config.median_radius == 0 {
        blurred
    } else {
        imageproc::filter::median_filter(&blurred, config.median_radius, config.median_radius)
    };

    tracing::debug!(
        src_width = src_w,
        src_height = src_h,
        width = w,
        height = h,
        filter = %config.resize_filter,
        "preprocessed"
    );
    Ok(filtered)
}
