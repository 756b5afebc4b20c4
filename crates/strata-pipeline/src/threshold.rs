//! Image-derived binarization threshold for single-band mode.

use image::RgbImage;

use crate::color::luma;
use crate::types::VectorizeConfig;

/// Width the statistics are sampled at.
const SAMPLE_WIDTH: u32 = 200;

/// Lowest threshold the adaptive rule may pick.
pub const MIN_ADAPTIVE_THRESHOLD: u8 = 60;

/// Highest threshold the adaptive rule may pick.
pub const MAX_ADAPTIVE_THRESHOLD: u8 = 220;

/// Pick a binarization threshold from brightness statistics.
///
/// Statistics are taken over a copy shrunk to 200 px wide (if wider).
/// The threshold is `mean + 0.5 * stddev` of luma, clamped to
/// `60..=220`. Bright paper with dark ink pushes the threshold up so
/// anti-aliased edges still count as ink.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn adaptive_threshold(image: &RgbImage) -> u8 {
    let (w, h) = image.dimensions();
    let sampled;
    let source = if w > SAMPLE_WIDTH {
        let sample_h = (f64::from(h) * f64::from(SAMPLE_WIDTH) / f64::from(w))
            .round()
            .max(1.0) as u32;
        sampled = image::imageops::resize(
            image,
            SAMPLE_WIDTH,
            sample_h,
            image::imageops::FilterType::Triangle,
        );
        &sampled
    } else {
        image
    };

    let n = f64::from(source.width()) * f64::from(source.height());
    if n == 0.0 {
        return VectorizeConfig::DEFAULT_THRESHOLD;
    }
    let (sum, sum_sq) = source.pixels().fold((0.0, 0.0), |(s, sq), &px| {
        let v = f64::from(luma(px));
        (s + v, v.mul_add(v, sq))
    });
    let mean = sum / n;
    let stddev = mean.mul_add(-mean, sum_sq / n).max(0.0).sqrt();
    let threshold = 0.5f64.mul_add(stddev, mean).round().clamp(
        f64::from(MIN_ADAPTIVE_THRESHOLD),
        f64::from(MAX_ADAPTIVE_THRESHOLD),
    ) as u8;

    tracing::debug!(mean, stddev, threshold, "adaptive threshold");
    threshold
}
