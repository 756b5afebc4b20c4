//! Boundary tracing: turn a binary band mask into closed SVG outlines.
//!
//! This module defines the [`LayerTracer`] trait for pluggable tracing
//! algorithms and the [`TracerKind`] enum for selecting one at runtime.
//!
//! # Strategy pattern
//!
//! Different tracers trade smoothness for fidelity on the same mask.
//! `vtracer` fits splines (or polygons) to cluster boundaries; border
//! following keeps the exact pixel outline and only thins it with RDP.
//! Every implementation is synchronous and I/O free.

use std::fmt;
use std::str::FromStr;

use image::GrayImage;
use serde::{Deserialize, Serialize};
use visioncortex::PathSimplifyMode;

use crate::color::Rgb;
use crate::mask::FOREGROUND;
use crate::simplify::simplify_ring;
use crate::types::{Layer, PipelineError, Point, Polyline, TraceParams, TracedPath};

/// Selects which tracing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TracerKind {
    /// `vtracer` binary mode with spline fitting. Smooth curves, closest
    /// to what potrace produces for logos.
    #[default]
    Spline,
    /// `vtracer` binary mode with polygon fitting.
    Polygon,
    /// Suzuki-Abe border following via `imageproc::contours::find_contours`,
    /// simplified with RDP. Straight segments only.
    BorderFollowing,
}

impl TracerKind {
    /// Every tracer, in declaration order.
    pub const ALL: [Self; 3] = [Self::Spline, Self::Polygon, Self::BorderFollowing];

    const fn as_str(self) -> &'static str {
        match self {
            Self::Spline => "spline",
            Self::Polygon => "polygon",
            Self::BorderFollowing => "border-following",
        }
    }
}

impl fmt::Display for TracerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TracerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown tracer: {s}"))
    }
}

/// Trait for tracing strategies.
///
/// Input: a binary mask (255 = member, 0 = background).
/// Output: closed outlines in mask pixel coordinates. Holes are emitted
/// so that even-odd filling cuts them out.
pub trait LayerTracer {
    /// Trace the outlines of the foreground of `mask`.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message when the backend fails.
    fn trace(&self, mask: &GrayImage, params: &TraceParams) -> Result<Vec<TracedPath>, String>;
}

impl LayerTracer for TracerKind {
    fn trace(&self, mask: &GrayImage, params: &TraceParams) -> Result<Vec<TracedPath>, String> {
        match *self {
            Self::Spline => trace_vtracer(mask, params, PathSimplifyMode::Spline),
            Self::Polygon => trace_vtracer(mask, params, PathSimplifyMode::Polygon),
            Self::BorderFollowing => Ok(trace_border_following(mask, params)),
        }
    }
}

/// Trace one band mask into a [`Layer`] filled with `color`.
///
/// # Errors
///
/// Returns [`PipelineError::Trace`] carrying `band_index` when the
/// tracer fails.
pub fn trace_layer<T: LayerTracer + ?Sized>(
    mask: &GrayImage,
    color: Rgb,
    band_index: usize,
    tracer: &T,
    params: &TraceParams,
) -> Result<Layer, PipelineError> {
    let paths = tracer
        .trace(mask, params)
        .map_err(|message| PipelineError::Trace {
            band: band_index,
            message,
        })?;
    tracing::debug!(band = band_index, paths = paths.len(), "traced layer");
    Ok(Layer {
        band_index,
        fill: color,
        paths,
    })
}

// ───────────────────────── vtracer ─────────────────────────

/// Render the mask as vtracer's binary input: members black, the rest
/// white (vtracer treats dark pixels as foreground).
fn to_color_image(mask: &GrayImage) -> vtracer::ColorImage {
    let pixels = mask
        .pixels()
        .flat_map(|p| {
            if p.0[0] == FOREGROUND {
                [0, 0, 0, 255]
            } else {
                [255, 255, 255, 255]
            }
        })
        .collect();
    vtracer::ColorImage {
        pixels,
        width: mask.width() as usize,
        height: mask.height() as usize,
    }
}

fn trace_vtracer(
    mask: &GrayImage,
    params: &TraceParams,
    mode: PathSimplifyMode,
) -> Result<Vec<TracedPath>, String> {
    if !mask.pixels().any(|p| p.0[0] == FOREGROUND) {
        return Ok(Vec::new());
    }

    let config = vtracer::Config {
        color_mode: vtracer::ColorMode::Binary,
        hierarchical: vtracer::Hierarchical::Stacked,
        mode,
        filter_speckle: params.turd_size as usize,
        color_precision: 6,
        layer_difference: 16,
        corner_threshold: params.corner_threshold,
        length_threshold: params.length_threshold,
        max_iterations: params.max_iterations as usize,
        splice_threshold: params.splice_threshold,
        path_precision: Some(params.path_precision),
    };

    let svg = vtracer::convert(to_color_image(mask), config)?;
    Ok(svg
        .paths
        .iter()
        .filter_map(|p| {
            let (d, offset) = p.path.to_svg_string(
                true,
                visioncortex::PointF64::default(),
                Some(params.path_precision),
            );
            let d = d.trim().to_owned();
            (!d.is_empty()).then_some(TracedPath {
                d,
                offset: (offset.x, offset.y),
            })
        })
        .collect())
}

// ───────────────────────── Border following ─────────────────────────

/// Format a coordinate with at most `precision` decimals, trimming
/// trailing zeros.
fn fmt_coord(out: &mut String, v: f64, precision: u32) {
    let mut s = format!("{v:.*}", precision as usize);
    if s.contains('.') {
        s.truncate(s.trim_end_matches('0').trim_end_matches('.').len());
    }
    if s == "-0" {
        s = "0".to_owned();
    }
    out.push_str(&s);
}

/// Append one closed ring as `M x y L x y ... Z`.
fn push_ring(d: &mut String, ring: &Polyline, precision: u32) {
    for (i, p) in ring.points().iter().enumerate() {
        if !d.is_empty() {
            d.push(' ');
        }
        d.push(if i == 0 { 'M' } else { 'L' });
        fmt_coord(d, p.x, precision);
        d.push(' ');
        fmt_coord(d, p.y, precision);
    }
    d.push('Z');
}

/// Border following over the whole mask, emitted as a single even-odd
/// path so holes cut out of their parents.
fn trace_border_following(mask: &GrayImage, params: &TraceParams) -> Vec<TracedPath> {
    let min_area = f64::from(params.turd_size).powi(2);
    let contours: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(mask);

    let mut d = String::new();
    for contour in contours {
        let ring = Polyline::new(
            contour
                .points
                .into_iter()
                .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                .collect(),
        );
        if ring.len() < 3 || ring.ring_area() < min_area {
            continue;
        }
        let simplified = simplify_ring(&ring, params.simplify_tolerance);
        if simplified.is_empty() {
            continue;
        }
        push_ring(&mut d, &simplified, params.path_precision);
    }

    if d.is_empty() {
        Vec::new()
    } else {
        vec![TracedPath {
            d,
            offset: (0.0, 0.0),
        }]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn square_mask(size: u32, lo: u32, hi: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if (lo..hi).contains(&x) && (lo..hi).contains(&y) {
                image::Luma([FOREGROUND])
            } else {
                image::Luma([0])
            }
        })
    }

    fn ring_mask() -> GrayImage {
        GrayImage::from_fn(60, 60, |x, y| {
            let outer = (10..50).contains(&x) && (10..50).contains(&y);
            let hole = (25..35).contains(&x) && (25..35).contains(&y);
            if outer && !hole {
                image::Luma([FOREGROUND])
            } else {
                image::Luma([0])
            }
        })
    }

    struct Failing;

    impl LayerTracer for Failing {
        fn trace(&self, _: &GrayImage, _: &TraceParams) -> Result<Vec<TracedPath>, String> {
            Err("backend exploded".into())
        }
    }

    #[test]
    fn default_is_spline() {
        assert_eq!(TracerKind::default(), TracerKind::Spline);
    }

    #[test]
    fn tracer_names_round_trip() {
        for t in TracerKind::ALL {
            assert_eq!(t.to_string().parse::<TracerKind>().unwrap(), t);
        }
        assert!("potrace".parse::<TracerKind>().is_err());
    }

    #[test]
    fn empty_mask_yields_no_paths() {
        let mask = GrayImage::new(20, 20);
        for t in TracerKind::ALL {
            assert!(t.trace(&mask, &TraceParams::default()).unwrap().is_empty());
        }
    }

    #[test]
    fn vtracer_input_is_inverted() {
        let img = to_color_image(&square_mask(4, 1, 3));
        assert_eq!(img.width, 4);
        assert_eq!(&img.pixels[0..4], &[255, 255, 255, 255]);
        let inside = (4 + 1) * 4;
        assert_eq!(&img.pixels[inside..inside + 4], &[0, 0, 0, 255]);
    }

    #[test]
    fn spline_traces_square() {
        let paths = TracerKind::Spline
            .trace(&square_mask(100, 25, 75), &TraceParams::default())
            .unwrap();
        assert!(!paths.is_empty());
        assert!(paths.iter().all(|p| p.d.starts_with('M')));
    }

    #[test]
    fn polygon_traces_square() {
        let paths = TracerKind::Polygon
            .trace(&square_mask(100, 25, 75), &TraceParams::default())
            .unwrap();
        assert!(!paths.is_empty());
    }

    #[test]
    fn border_following_square_is_one_path() {
        let paths = TracerKind::BorderFollowing
            .trace(&square_mask(100, 25, 75), &TraceParams::default())
            .unwrap();
        assert_eq!(paths.len(), 1);
        let d = &paths[0].d;
        assert!(d.starts_with('M') && d.ends_with('Z'), "{d}");
        assert_eq!(d.matches('M').count(), 1, "{d}");
        assert_eq!(paths[0].offset, (0.0, 0.0));
    }

    #[test]
    fn border_following_keeps_holes() {
        let paths = TracerKind::BorderFollowing
            .trace(&ring_mask(), &TraceParams::default())
            .unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].d.matches('M').count(), 2, "{}", paths[0].d);
    }

    #[test]
    fn border_following_drops_specks() {
        let mut mask = square_mask(100, 25, 75);
        mask.put_pixel(5, 5, image::Luma([FOREGROUND]));
        mask.put_pixel(6, 5, image::Luma([FOREGROUND]));
        let paths = TracerKind::BorderFollowing
            .trace(&mask, &TraceParams::default())
            .unwrap();
        assert_eq!(paths[0].d.matches('M').count(), 1);
    }

    #[test]
    fn trace_layer_wraps_failure_with_band_index() {
        let err = trace_layer(
            &square_mask(10, 2, 8),
            Rgb::BLACK,
            3,
            &Failing,
            &TraceParams::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Trace { band: 3, ref message } if message == "backend exploded"
        ));
    }

    #[test]
    fn trace_layer_carries_fill() {
        let layer = trace_layer(
            &square_mask(40, 10, 30),
            Rgb::new(1, 2, 3),
            1,
            &TracerKind::BorderFollowing,
            &TraceParams::default(),
        )
        .unwrap();
        assert_eq!(layer.band_index, 1);
        assert_eq!(layer.fill, Rgb::new(1, 2, 3));
        assert!(!layer.is_empty());
    }

    #[test]
    fn coordinates_trim_trailing_zeros() {
        let mut s = String::new();
        fmt_coord(&mut s, 12.0, 2);
        s.push(' ');
        fmt_coord(&mut s, 3.456, 2);
        s.push(' ');
        fmt_coord(&mut s, -0.001, 2);
        assert_eq!(s, "12 3.46 0");
    }
}
