//! strata-pipeline: Pure color-band vectorizing pipeline (sans-IO).
//!
//! Converts raster logos and illustrations into layered flat-color
//! vector outlines through:
//! decode -> flatten/resize/denoise -> band partition -> per-band mask ->
//! boundary tracing -> ordered layers.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! byte slices and returns structured data. SVG serialization lives in
//! `strata-export`; the CLI and HTTP server wrap both.

pub mod color;
pub mod mask;
pub mod partition;
pub mod pipeline;
pub mod preprocess;
pub mod simplify;
pub mod threshold;
pub mod trace;
pub mod types;

pub use color::Rgb;
pub use partition::{KmeansResult, PartitionStrategy, clamp_color_count, kmeans, partition};
pub use pipeline::{Partitioned, Pipeline, Preprocessed, Received, Traced};
pub use preprocess::{ResizeFilter, normalize, target_dimensions};
pub use trace::{LayerTracer, TracerKind, trace_layer};
pub use types::{
    Band, BandPredicate, Dimensions, GrayImage, Layer, PartitionConfig, PipelineError, Point,
    Polyline, PreprocessConfig, RgbImage, SkippedBand, TraceFailurePolicy, TraceParams,
    TracedPath, Vectorized, VectorizeConfig,
};

/// Run the full vectorizing pipeline.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP, GIF) and a configuration,
/// and produces a [`Vectorized`] document: the working raster's
/// dimensions plus one filled layer per non-empty band, in paint order.
///
/// # Pipeline steps
///
/// 1. Validate the config
/// 2. Decode, flatten alpha over white, shrink to the working long side
/// 3. Optional Gaussian blur, then median denoise
/// 4. `colors <= 1`: binarize (fixed or adaptive threshold) and trace one
///    black layer on a white background
/// 5. `colors >= 2`: partition into bands, build each band's mask and
///    trace it in parallel, drop empty layers
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for out-of-range tuning values.
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
/// Returns [`PipelineError::Trace`] if a band fails to trace under
/// [`TraceFailurePolicy::Abort`].
pub fn process(image_bytes: &[u8], config: &VectorizeConfig) -> Result<Vectorized, PipelineError> {
    let preprocessed = Pipeline::new(image_bytes.to_vec(), config.clone()).preprocess()?;
    let traced = if preprocessed.is_single_band() {
        preprocessed.trace_single()?
    } else {
        preprocessed.partition().trace_bands()?
    };
    Ok(traced.into_document())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Encode an RGBA image as PNG in memory.
    fn png(img: &image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    /// Dark disc on light paper, like a scanned stamp.
    fn disc_png(size: u32) -> Vec<u8> {
        let c = f64::from(size) / 2.0;
        let r = f64::from(size) / 3.0;
        png(&image::RgbaImage::from_fn(size, size, |x, y| {
            let dx = f64::from(x) - c;
            let dy = f64::from(y) - c;
            if dx.hypot(dy) < r {
                image::Rgba([20, 20, 30, 255])
            } else {
                image::Rgba([240, 235, 225, 255])
            }
        }))
    }

    #[test]
    fn empty_input_returns_error() {
        let result = process(&[], &VectorizeConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn non_image_bytes_return_decode_error() {
        let result = process(b"definitely not a png", &VectorizeConfig::default());
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn default_config_traces_single_layer() {
        let doc = process(&disc_png(120), &VectorizeConfig::default()).unwrap();
        assert_eq!(doc.layers.len(), 1);
        assert_eq!(doc.layers[0].fill, Rgb::BLACK);
        assert_eq!(doc.background, Some(Rgb::WHITE));
        assert!(!doc.layers[0].is_empty());
    }

    #[test]
    fn adaptive_threshold_single_layer() {
        let config = VectorizeConfig {
            adaptive_threshold: true,
            ..VectorizeConfig::default()
        };
        let doc = process(&disc_png(120), &config).unwrap();
        assert_eq!(doc.layers.len(), 1);
        assert!(!doc.layers[0].is_empty());
    }

    #[test]
    fn dimensions_follow_long_side() {
        let img = image::RgbaImage::from_pixel(300, 150, image::Rgba([0, 0, 0, 255]));
        let config = VectorizeConfig {
            preprocess: PreprocessConfig {
                long_side: 100,
                ..PreprocessConfig::default()
            },
            ..VectorizeConfig::default()
        };
        let doc = process(&png(&img), &config).unwrap();
        assert_eq!(
            doc.dimensions,
            Dimensions {
                width: 100,
                height: 50
            }
        );
    }

    #[test]
    fn colors_are_clamped_to_six() {
        let config = VectorizeConfig {
            colors: 40,
            tracer: TracerKind::BorderFollowing,
            ..VectorizeConfig::default()
        };
        let doc = process(&disc_png(80), &config).unwrap();
        assert!(doc.layers.len() <= 6);
    }

    #[test]
    fn partitioning_is_deterministic() {
        let bytes = disc_png(90);
        for strategy in PartitionStrategy::ALL {
            let config = VectorizeConfig {
                colors: 3,
                tracer: TracerKind::BorderFollowing,
                partition: PartitionConfig {
                    strategy,
                    ..PartitionConfig::default()
                },
                ..VectorizeConfig::default()
            };
            let a = process(&bytes, &config).unwrap();
            let b = process(&bytes, &config).unwrap();
            assert_eq!(a, b, "{strategy} is not deterministic");
        }
    }
}
