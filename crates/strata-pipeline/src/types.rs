//! Shared types for the strata vectorizing pipeline.

use serde::{Deserialize, Serialize};

use crate::color::Rgb;
use crate::partition::PartitionStrategy;
use crate::preprocess::ResizeFilter;
use crate::trace::TracerKind;

/// Re-export `GrayImage` so downstream crates can reference binary
/// masks without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage`, the working raster type.
pub use image::RgbImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// A sequence of connected points forming a path segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Signed-area magnitude of the polyline treated as a closed ring
    /// (shoelace formula).
    #[must_use]
    pub fn ring_area(&self) -> f64 {
        let pts = &self.0;
        if pts.len() < 3 {
            return 0.0;
        }
        let twice: f64 = pts
            .iter()
            .zip(pts.iter().cycle().skip(1))
            .map(|(a, b)| a.x.mul_add(b.y, -(b.x * a.y)))
            .sum();
        twice.abs() / 2.0
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of a raster.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count.
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Membership test deciding whether a pixel belongs to a band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BandPredicate {
    /// Luma in `low..high` (or `low..=high` when `inclusive_high`).
    LumaRange {
        /// Lower bound, inclusive.
        low: f32,
        /// Upper bound.
        high: f32,
        /// Whether `high` itself belongs to the band.
        inclusive_high: bool,
    },
    /// Squared RGB distance to `center` at most `max_distance_sq`.
    ColorDistance {
        /// Cluster centroid.
        center: Rgb,
        /// Squared-distance tolerance.
        max_distance_sq: u32,
    },
    /// Pixel posterized to `levels` per channel equals `color`.
    Posterized {
        /// Quantization levels per channel.
        levels: u8,
        /// Palette entry.
        color: Rgb,
    },
    /// Luma strictly below `threshold` (dark ink on light paper).
    LumaBelow {
        /// Binarization threshold.
        threshold: u8,
    },
}

/// One color band: a membership predicate plus the color its layer is
/// painted with.
///
/// Bands are produced as an ordered sequence; position determines paint
/// order (later bands are drawn on top).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    /// Position in the original partition.
    pub index: usize,
    /// Membership test.
    pub predicate: BandPredicate,
    /// Representative display color.
    pub color: Rgb,
    /// Pixels of the working raster that satisfied the partition rule.
    pub pixel_count: u64,
}

/// One closed path (possibly with holes) in mask pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracedPath {
    /// SVG path data.
    pub d: String,
    /// Translation applied to `d` (tracers may emit origin-relative data).
    pub offset: (f64, f64),
}

/// The traced geometry of one band.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Index of the originating band.
    pub band_index: usize,
    /// Fill color.
    pub fill: Rgb,
    /// Closed outlines.
    pub paths: Vec<TracedPath>,
}

impl Layer {
    /// Whether the tracer produced any geometry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.iter().all(|p| p.d.is_empty())
    }
}

/// A band omitted under [`TraceFailurePolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBand {
    /// Index of the band that failed.
    pub band: usize,
    /// Tracer error message.
    pub message: String,
}

/// The composed vector result: a viewport plus ordered layers.
///
/// Serialized to SVG by `strata-export`.
#[derive(Debug, Clone, PartialEq)]
pub struct Vectorized {
    /// Working raster dimensions; the SVG `viewBox` is `0 0 w h`.
    pub dimensions: Dimensions,
    /// Opaque background painted under every layer, if any.
    pub background: Option<Rgb>,
    /// Layers in paint order.
    pub layers: Vec<Layer>,
    /// Bands dropped because their trace failed.
    pub skipped: Vec<SkippedBand>,
}

/// What to do when the tracer fails on one band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraceFailurePolicy {
    /// Fail the whole request.
    #[default]
    Abort,
    /// Omit the band and record a [`SkippedBand`].
    Skip,
}

/// Preprocessing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Target length of the longer side in pixels. Never upsampled.
    pub long_side: u32,
    /// Resampling filter used when shrinking.
    pub resize_filter: ResizeFilter,
    /// Gaussian blur sigma applied before the median filter (0 disables).
    pub blur_sigma: f32,
    /// Median filter radius (0 disables, 1 is a 3x3 window).
    pub median_radius: u32,
}

impl PreprocessConfig {
    /// Default long side.
    pub const DEFAULT_LONG_SIDE: u32 = 800;
    /// Default median radius.
    pub const DEFAULT_MEDIAN_RADIUS: u32 = 1;
    /// Largest accepted blur sigma. The kernel grows with `4·sigma`.
    pub const MAX_BLUR_SIGMA: f32 = 64.0;
    /// Largest accepted median radius. Cost per pixel grows with the
    /// window side.
    pub const MAX_MEDIAN_RADIUS: u32 = 32;
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            long_side: Self::DEFAULT_LONG_SIDE,
            resize_filter: ResizeFilter::default(),
            blur_sigma: 0.0,
            median_radius: Self::DEFAULT_MEDIAN_RADIUS,
        }
    }
}

/// Band partitioning parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Which partitioning strategy to use.
    pub strategy: PartitionStrategy,
    /// Squared RGB distance tolerance for cluster membership masks.
    pub color_tolerance: u32,
    /// Fixed k-means iteration budget.
    pub kmeans_iterations: u32,
    /// Seed for k-means centroid sampling.
    pub kmeans_seed: u64,
    /// Clusters with fewer members than this are dropped.
    pub min_band_pixels: u64,
}

impl PartitionConfig {
    /// Default squared-distance tolerance.
    pub const DEFAULT_COLOR_TOLERANCE: u32 = 4000;
    /// Default k-means iteration budget.
    pub const DEFAULT_KMEANS_ITERATIONS: u32 = 8;
    /// Default minimum cluster size.
    pub const DEFAULT_MIN_BAND_PIXELS: u64 = 1000;
    /// Largest accepted k-means iteration budget.
    pub const MAX_KMEANS_ITERATIONS: u32 = 100;
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            strategy: PartitionStrategy::default(),
            color_tolerance: Self::DEFAULT_COLOR_TOLERANCE,
            kmeans_iterations: Self::DEFAULT_KMEANS_ITERATIONS,
            kmeans_seed: 0,
            min_band_pixels: Self::DEFAULT_MIN_BAND_PIXELS,
        }
    }
}

/// Tolerances handed to the boundary tracer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceParams {
    /// Minimum feature size: blobs narrower than this (area below its
    /// square) are discarded as speckle.
    pub turd_size: u32,
    /// Minimum angle in degrees treated as a corner when curve fitting.
    pub corner_threshold: i32,
    /// Minimum segment length kept by curve fitting.
    pub length_threshold: f64,
    /// Minimum angle displacement in degrees to splice a spline.
    pub splice_threshold: i32,
    /// Curve-fitting iterations.
    pub max_iterations: u32,
    /// Decimal places in emitted path data.
    pub path_precision: u32,
    /// RDP tolerance in pixels for the border-following tracer.
    pub simplify_tolerance: f64,
}

impl TraceParams {
    /// Default minimum feature size.
    pub const DEFAULT_TURD_SIZE: u32 = 5;
    /// Default corner threshold.
    pub const DEFAULT_CORNER_THRESHOLD: i32 = 60;
    /// Default length threshold.
    pub const DEFAULT_LENGTH_THRESHOLD: f64 = 4.0;
    /// Largest accepted curve-fitting iteration count.
    pub const MAX_ITERATIONS: u32 = 100;
    /// Largest accepted number of decimals in path data.
    pub const MAX_PATH_PRECISION: u32 = 8;
}

impl Default for TraceParams {
    fn default() -> Self {
        Self {
            turd_size: Self::DEFAULT_TURD_SIZE,
            corner_threshold: Self::DEFAULT_CORNER_THRESHOLD,
            length_threshold: Self::DEFAULT_LENGTH_THRESHOLD,
            splice_threshold: 45,
            max_iterations: 10,
            path_precision: 2,
            simplify_tolerance: 1.0,
        }
    }
}

/// Configuration for one vectorizing run.
///
/// All parameters have sensible defaults; `colors = 1` selects the
/// single-band (black on white) path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizeConfig {
    /// Requested number of color bands (clamped to `1..=6`).
    pub colors: u32,
    /// Preprocessing parameters.
    pub preprocess: PreprocessConfig,
    /// Band partitioning parameters.
    pub partition: PartitionConfig,
    /// Which boundary tracer to use.
    pub tracer: TracerKind,
    /// Tracer tolerances.
    pub trace: TraceParams,
    /// Global binarization threshold for single-band mode.
    pub threshold: u8,
    /// Derive the single-band threshold from image statistics instead.
    pub adaptive_threshold: bool,
    /// Behavior when one band fails to trace.
    pub on_trace_failure: TraceFailurePolicy,
}

impl VectorizeConfig {
    /// Default band count.
    pub const DEFAULT_COLORS: u32 = 1;
    /// Default single-band threshold.
    pub const DEFAULT_THRESHOLD: u8 = 128;

    /// Check tuning values that would make downstream stages misbehave.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: &str| Err(PipelineError::InvalidConfig(msg.to_owned()));
        if self.preprocess.long_side == 0 {
            return invalid("long_side must be at least 1");
        }
        if !(0.0..=PreprocessConfig::MAX_BLUR_SIGMA).contains(&self.preprocess.blur_sigma) {
            return invalid("blur_sigma must be within 0..=64");
        }
        if self.preprocess.median_radius > PreprocessConfig::MAX_MEDIAN_RADIUS {
            return invalid("median_radius must be at most 32");
        }
        if !self.trace.length_threshold.is_finite() || self.trace.length_threshold < 0.0 {
            return invalid("length_threshold must be finite and non-negative");
        }
        if !self.trace.simplify_tolerance.is_finite() || self.trace.simplify_tolerance < 0.0 {
            return invalid("simplify_tolerance must be finite and non-negative");
        }
        if !(0..=180).contains(&self.trace.corner_threshold) {
            return invalid("corner_threshold must be within 0..=180 degrees");
        }
        if !(0..=180).contains(&self.trace.splice_threshold) {
            return invalid("splice_threshold must be within 0..=180 degrees");
        }
        if !(1..=PartitionConfig::MAX_KMEANS_ITERATIONS).contains(&self.partition.kmeans_iterations)
        {
            return invalid("kmeans_iterations must be within 1..=100");
        }
        if self.trace.max_iterations > TraceParams::MAX_ITERATIONS {
            return invalid("max_iterations must be at most 100");
        }
        if self.trace.path_precision > TraceParams::MAX_PATH_PRECISION {
            return invalid("path_precision must be at most 8");
        }
        Ok(())
    }
}

impl Default for VectorizeConfig {
    fn default() -> Self {
        Self {
            colors: Self::DEFAULT_COLORS,
            preprocess: PreprocessConfig::default(),
            partition: PartitionConfig::default(),
            tracer: TracerKind::default(),
            trace: TraceParams::default(),
            threshold: Self::DEFAULT_THRESHOLD,
            adaptive_threshold: false,
            on_trace_failure: TraceFailurePolicy::default(),
        }
    }
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The boundary tracer failed on one band's mask.
    #[error("tracing band {band} failed: {message}")]
    Trace {
        /// Index of the failing band.
        band: usize,
        /// Tracer error message.
        message: String,
    },
}
