//! Split the working raster into an ordered list of color bands.
//!
//! Every strategy returns one [`Band`] per output layer, in paint order.
//! The predicate carried by each band is the same test the mask builder
//! applies later, so `pixel_count` always agrees with the mask for the
//! luma and posterize strategies.

use std::fmt;
use std::str::FromStr;

use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::color::{self, ColorAccumulator, Rgb};
use crate::types::{Band, BandPredicate, PartitionConfig};

/// Largest number of bands a request may ask for.
pub const MAX_COLORS: u32 = 6;

/// How pixels are assigned to bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionStrategy {
    /// Equal-width luma intervals between the image's darkest and
    /// brightest pixel.
    #[default]
    EqualRange,
    /// Luma intervals holding roughly the same number of pixels.
    EqualFrequency,
    /// k-means clustering in RGB space.
    KMeans,
    /// Uniform per-channel quantization.
    Posterize,
}

impl PartitionStrategy {
    /// Every strategy, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::EqualRange,
        Self::EqualFrequency,
        Self::KMeans,
        Self::Posterize,
    ];

    const fn as_str(self) -> &'static str {
        match self {
            Self::EqualRange => "equal-range",
            Self::EqualFrequency => "equal-frequency",
            Self::KMeans => "k-means",
            Self::Posterize => "posterize",
        }
    }
}

impl fmt::Display for PartitionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartitionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("kmeans") {
            return Ok(Self::KMeans);
        }
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown partition strategy: {s}"))
    }
}

/// Clamp a requested band count into `1..=MAX_COLORS`.
#[must_use]
pub fn clamp_color_count(requested: u32) -> u32 {
    requested.clamp(1, MAX_COLORS)
}

impl BandPredicate {
    /// Whether `px` belongs to the band.
    #[must_use]
    pub fn contains(&self, px: image::Rgb<u8>) -> bool {
        match *self {
            Self::LumaRange {
                low,
                high,
                inclusive_high,
            } => {
                let l = color::luma(px);
                l >= low && (l < high || (inclusive_high && l <= high))
            }
            Self::ColorDistance {
                center,
                max_distance_sq,
            } => Rgb::from(px).distance_sq(center) <= max_distance_sq,
            Self::Posterized { levels, color } => posterize_pixel(px, levels) == color,
            Self::LumaBelow { threshold } => color::luma(px) < f32::from(threshold),
        }
    }
}

/// Partition `image` into at most `color_count` bands.
///
/// `color_count` is clamped with [`clamp_color_count`]. The result is
/// deterministic for a given image and config (k-means is seeded).
#[must_use]
pub fn partition(image: &RgbImage, color_count: u32, config: &PartitionConfig) -> Vec<Band> {
    let n = clamp_color_count(color_count) as usize;
    let bands = match config.strategy {
        PartitionStrategy::EqualRange => equal_range(image, n),
        PartitionStrategy::EqualFrequency => equal_frequency(image, n),
        PartitionStrategy::KMeans => kmeans_bands(image, n, config),
        PartitionStrategy::Posterize => posterize(image, n),
    };
    tracing::debug!(
        strategy = %config.strategy,
        requested = n,
        bands = bands.len(),
        "partitioned"
    );
    bands
}

/// Count members and average colors for a set of disjoint predicates.
///
/// Each pixel is credited to the first predicate that contains it. Bands
/// with no members are colored with an evenly spaced fallback hue.
fn summarize(image: &RgbImage, predicates: Vec<BandPredicate>) -> Vec<Band> {
    let mut acc = vec![ColorAccumulator::default(); predicates.len()];
    for &px in image.pixels() {
        if let Some(i) = predicates.iter().position(|p| p.contains(px)) {
            acc[i].push(px);
        }
    }
    let count = predicates.len();
    predicates
        .into_iter()
        .zip(acc)
        .enumerate()
        .map(|(index, (predicate, acc))| Band {
            index,
            predicate,
            color: acc.mean().unwrap_or_else(|| Rgb::band_hue(index, count)),
            pixel_count: acc.count(),
        })
        .collect()
}

// ───────────────────────── Equal range ─────────────────────────

fn equal_range(image: &RgbImage, n: usize) -> Vec<Band> {
    let (min, max) = image
        .pixels()
        .map(|&px| color::luma(px))
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), l| {
            (lo.min(l), hi.max(l))
        });
    if !min.is_finite() {
        return Vec::new();
    }

    #[allow(clippy::cast_precision_loss)]
    let step = (max - min) / n as f32;
    let uniform = step <= 0.0;
    #[allow(clippy::cast_precision_loss)]
    let bound = |i: usize| {
        if uniform || i == n {
            max
        } else {
            (i as f32).mul_add(step, min)
        }
    };

    let predicates = (0..n)
        .map(|i| BandPredicate::LumaRange {
            low: if i == 0 { min } else { bound(i) },
            high: bound(i + 1),
            inclusive_high: if uniform { i == 0 } else { i == n - 1 },
        })
        .collect();
    summarize(image, predicates)
}

// ───────────────────────── Equal frequency ─────────────────────────

/// Bin boundaries `t_0 = 0 <= t_1 <= ... <= t_n = 256` such that bins
/// `t_i..t_{i+1}` of `histogram` hold roughly `total / n` pixels each.
///
/// When the cumulative count crosses `total * i / n` inside a bin, the
/// boundary goes on whichever side of that bin lands closer to the
/// target. Flat-color art is a handful of spikes, and always cutting
/// after the spike would fold a majority color into the band below it.
fn frequency_thresholds(histogram: &[u64; 256], n: usize) -> Vec<usize> {
    let total: u64 = histogram.iter().sum();
    let n64 = n as u64;
    let mut thresholds = Vec::with_capacity(n + 1);
    thresholds.push(0);
    let mut cumulative = 0u64;
    let mut next = 1u64;
    for (bin, &count) in histogram.iter().enumerate() {
        let before = cumulative;
        cumulative += count;
        while next < n64 && cumulative * n64 >= total * next {
            // Distances to the target, scaled by `n`.
            let target = total * next;
            let short = target.saturating_sub(before * n64);
            let over = cumulative * n64 - target;
            thresholds.push(if short < over { bin } else { bin + 1 });
            next += 1;
        }
    }
    while thresholds.len() < n {
        thresholds.push(256);
    }
    thresholds.push(256);
    thresholds
}

fn equal_frequency(image: &RgbImage, n: usize) -> Vec<Band> {
    let mut histogram = [0u64; 256];
    for &px in image.pixels() {
        histogram[usize::from(color::luma_bin(px))] += 1;
    }
    let thresholds = frequency_thresholds(&histogram, n);

    // A pixel lands in bin `b` exactly when its luma is in
    // `[b - 0.5, b + 0.5)`, so half-integer bounds reproduce the bins.
    #[allow(clippy::cast_precision_loss)]
    let edge = |t: usize| t as f32 - 0.5;
    let predicates = thresholds
        .windows(2)
        .map(|w| BandPredicate::LumaRange {
            low: edge(w[0]),
            high: edge(w[1]),
            inclusive_high: false,
        })
        .collect();
    summarize(image, predicates)
}

// ───────────────────────── k-means ─────────────────────────

/// Outcome of [`kmeans`].
#[derive(Debug, Clone, PartialEq)]
pub struct KmeansResult {
    /// Final centroids.
    pub centroids: Vec<Rgb>,
    /// Members assigned to each centroid in the last round.
    pub counts: Vec<u64>,
    /// Rounds actually run.
    pub iterations: u32,
    /// Largest squared centroid movement in the last round.
    pub last_shift: u32,
}

fn nearest(px: Rgb, centroids: &[Rgb]) -> usize {
    centroids
        .iter()
        .enumerate()
        .min_by_key(|(_, c)| px.distance_sq(**c))
        .map_or(0, |(i, _)| i)
}

/// Cluster the pixels of `image` into `k` colors.
///
/// Centroids start as uniformly sampled pixels (seeded by `seed`). Each
/// round assigns every pixel to its nearest centroid and moves each
/// centroid to the mean of its members; centroids that lose all members
/// stay put. Stops after `iterations` rounds or as soon as no centroid
/// moves.
#[must_use]
pub fn kmeans(image: &RgbImage, k: usize, iterations: u32, seed: u64) -> KmeansResult {
    let pixels: Vec<Rgb> = image.pixels().map(|&px| Rgb::from(px)).collect();
    if pixels.is_empty() || k == 0 {
        return KmeansResult {
            centroids: Vec::new(),
            counts: Vec::new(),
            iterations: 0,
            last_shift: 0,
        };
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let centroids: Vec<Rgb> = (0..k)
        .map(|_| pixels[rng.gen_range(0..pixels.len())])
        .collect();
    refine(&pixels, centroids, iterations)
}

/// Lloyd iterations starting from `centroids`.
fn refine(pixels: &[Rgb], mut centroids: Vec<Rgb>, iterations: u32) -> KmeansResult {
    let k = centroids.len();
    let mut counts = vec![0u64; k];
    let mut rounds = 0;
    let mut last_shift = 0;

    while rounds < iterations {
        rounds += 1;
        let mut acc = vec![ColorAccumulator::default(); k];
        for &px in pixels {
            acc[nearest(px, &centroids)].push(px.into());
        }
        last_shift = 0;
        for (centroid, acc) in centroids.iter_mut().zip(&acc) {
            if let Some(mean) = acc.mean() {
                last_shift = last_shift.max(centroid.distance_sq(mean));
                *centroid = mean;
            }
        }
        counts = acc.iter().map(ColorAccumulator::count).collect();
        if last_shift == 0 {
            break;
        }
    }

    tracing::debug!(k, rounds, last_shift, "k-means finished");
    KmeansResult {
        centroids,
        counts,
        iterations: rounds,
        last_shift,
    }
}

fn kmeans_bands(image: &RgbImage, n: usize, config: &PartitionConfig) -> Vec<Band> {
    let result = kmeans(image, n, config.kmeans_iterations, config.kmeans_seed);
    let mut clusters: Vec<(Rgb, u64)> = result
        .centroids
        .into_iter()
        .zip(result.counts)
        .filter(|&(_, count)| count >= config.min_band_pixels)
        .collect();
    // Dominant (usually background) cluster is painted first.
    clusters.sort_by(|a, b| b.1.cmp(&a.1));
    clusters
        .into_iter()
        .enumerate()
        .map(|(index, (center, pixel_count))| Band {
            index,
            predicate: BandPredicate::ColorDistance {
                center,
                max_distance_sq: config.color_tolerance,
            },
            color: center,
            pixel_count,
        })
        .collect()
}

// ───────────────────────── Posterize ─────────────────────────

/// Quantize one channel to `levels` evenly spaced values.
#[allow(clippy::cast_possible_truncation)]
const fn quantize(c: u8, levels: u8) -> u8 {
    let steps = if levels < 2 { 1 } else { levels as u32 - 1 };
    let idx = (c as u32 * steps + 127) / 255;
    (idx * 255 / steps) as u8
}

/// Posterize a pixel to `levels` values per channel.
#[must_use]
pub fn posterize_pixel(px: image::Rgb<u8>, levels: u8) -> Rgb {
    let [r, g, b] = px.0;
    Rgb::new(
        quantize(r, levels),
        quantize(g, levels),
        quantize(b, levels),
    )
}

fn posterize(image: &RgbImage, n: usize) -> Vec<Band> {
    let levels = u8::try_from(n).unwrap_or(u8::MAX).max(2);
    let mut palette: Vec<Rgb> = Vec::with_capacity(n);
    for &px in image.pixels() {
        let q = posterize_pixel(px, levels);
        if !palette.contains(&q) {
            palette.push(q);
            if palette.len() == n {
                break;
            }
        }
    }
    let predicates: Vec<BandPredicate> = palette
        .iter()
        .map(|&color| BandPredicate::Posterized { levels, color })
        .collect();
    let mut bands = summarize(image, predicates);
    for (band, color) in bands.iter_mut().zip(palette) {
        band.color = color;
    }
    bands
}
