//! Binary masks: which pixels of the working raster belong to a band.
//!
//! Masks are strictly two-valued (`0` or `255`), so they can go straight
//! to a tracer without another threshold pass.

use image::{GrayImage, Luma, RgbImage};

use crate::color::Rgb;
use crate::types::{Band, BandPredicate};

/// Foreground value in a mask.
pub const FOREGROUND: u8 = 255;

fn mask_from_predicate(image: &RgbImage, predicate: &BandPredicate) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if predicate.contains(*image.get_pixel(x, y)) {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}

/// Build the mask for `band`, paired with the color its layer is filled
/// with. The raster is not modified.
#[must_use = "returns the band mask"]
pub fn build_mask(image: &RgbImage, band: &Band) -> (GrayImage, Rgb) {
    (mask_from_predicate(image, &band.predicate), band.color)
}

/// Binarize for single-band mode: pixels darker than `threshold` are
/// foreground (ink), everything else is paper.
#[must_use = "returns the binary mask"]
pub fn binarize(image: &RgbImage, threshold: u8) -> GrayImage {
    mask_from_predicate(image, &BandPredicate::LumaBelow { threshold })
}

/// Number of foreground pixels in `mask`.
#[must_use]
pub fn member_count(mask: &GrayImage) -> u64 {
    mask.pixels().filter(|p| p.0[0] == FOREGROUND).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripes() -> RgbImage {
        RgbImage::from_fn(10, 4, |x, _| {
            if x < 3 {
                image::Rgb([0, 0, 0])
            } else if x < 6 {
                image::Rgb([128, 128, 128])
            } else {
                image::Rgb([250, 250, 250])
            }
        })
    }

    #[test]
    fn mask_is_strictly_binary() {
        let band = Band {
            index: 0,
            predicate: BandPredicate::LumaRange {
                low: 100.0,
                high: 200.0,
                inclusive_high: false,
            },
            color: Rgb::new(128, 128, 128),
            pixel_count: 12,
        };
        let (mask, color) = build_mask(&stripes(), &band);
        assert_eq!(color, Rgb::new(128, 128, 128));
        assert!(mask.pixels().all(|p| p.0[0] == 0 || p.0[0] == FOREGROUND));
        assert_eq!(member_count(&mask), 12);
        assert_eq!(mask.get_pixel(4, 0).0[0], FOREGROUND);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn color_distance_mask_respects_tolerance() {
        let img = RgbImage::from_fn(3, 1, |x, _| match x {
            0 => image::Rgb([200, 0, 0]),
            1 => image::Rgb([230, 30, 0]),
            _ => image::Rgb([0, 0, 200]),
        });
        let band = Band {
            index: 0,
            predicate: BandPredicate::ColorDistance {
                center: Rgb::new(210, 10, 0),
                max_distance_sq: 4000,
            },
            color: Rgb::new(210, 10, 0),
            pixel_count: 2,
        };
        let (mask, _) = build_mask(&img, &band);
        assert_eq!(member_count(&mask), 2);
        assert_eq!(mask.get_pixel(2, 0).0[0], 0);
    }

    #[test]
    fn binarize_marks_dark_pixels() {
        let mask = binarize(&stripes(), 100);
        // Black column is ink; mid gray is paper.
        assert_eq!(member_count(&mask), 12);
        assert_eq!(mask.get_pixel(1, 1).0[0], FOREGROUND);
        assert_eq!(mask.get_pixel(9, 1).0[0], 0);
    }

    #[test]
    fn binarize_does_not_touch_source() {
        let img = stripes();
        let before = img.clone();
        let _ = binarize(&img, 200);
        assert_eq!(img, before);
    }

    #[test]
    fn empty_mask_counts_zero() {
        assert_eq!(member_count(&GrayImage::new(5, 5)), 0);
    }
}
