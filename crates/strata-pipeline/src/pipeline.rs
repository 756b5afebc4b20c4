//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! [`crate::process`] runs everything in one call; [`Pipeline`] lets the
//! caller drive execution one step at a time:
//!
//! ```rust
//! # use strata_pipeline::{Pipeline, VectorizeConfig, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let config = VectorizeConfig { colors: 3, ..VectorizeConfig::default() };
//! let partitioned = Pipeline::new(png, config).preprocess()?.partition();
//! for band in partitioned.bands() {
//!     println!("band {} -> {} ({} px)", band.index, band.color, band.pixel_count);
//! }
//! let _document = partitioned.trace_bands()?.into_document();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state (or a
//! `Result` for fallible stages). The working raster is dropped as soon
//! as tracing finishes; only vector data reaches [`Traced`].

use rayon::prelude::*;

use crate::color::Rgb;
use crate::trace::trace_layer;
use crate::types::{
    Band, Dimensions, Layer, PipelineError, RgbImage, SkippedBand, TraceFailurePolicy, Vectorized,
    VectorizeConfig,
};

// ───────────────────────── Stage 0: Received ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// The upload bytes and config are stored but not yet touched.
/// Call [`preprocess`](Self::preprocess) to advance.
#[must_use = "pipeline stages are consumed by advancing, call .preprocess() to continue"]
pub struct Received {
    config: VectorizeConfig,
    source: Vec<u8>,
}

impl Received {
    /// Validate the config, decode and normalize the upload.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for out-of-range tuning
    /// values, [`PipelineError::EmptyInput`] for an empty upload and
    /// [`PipelineError::ImageDecode`] for unreadable bytes.
    pub fn preprocess(self) -> Result<Preprocessed, PipelineError> {
        self.config.validate()?;
        let raster = crate::preprocess::normalize(&self.source, &self.config.preprocess)?;
        Ok(Preprocessed {
            config: self.config,
            raster,
        })
    }
}

// ───────────────────────── Stage 1: Preprocessed ──────────────────────

/// Pipeline state holding the normalized working raster.
///
/// Multi-band requests continue with [`partition`](Self::partition);
/// single-band requests with [`trace_single`](Self::trace_single).
#[must_use = "pipeline stages are consumed by advancing, call .partition() or .trace_single()"]
pub struct Preprocessed {
    config: VectorizeConfig,
    raster: RgbImage,
}

impl Preprocessed {
    /// The working raster.
    #[must_use]
    pub const fn raster(&self) -> &RgbImage {
        &self.raster
    }

    /// Whether the request takes the single-band (black on white) path.
    #[must_use]
    pub const fn is_single_band(&self) -> bool {
        self.config.colors <= 1
    }

    /// Split the raster into color bands.
    pub fn partition(self) -> Partitioned {
        let bands = crate::partition::partition(
            &self.raster,
            self.config.colors,
            &self.config.partition,
        );
        Partitioned {
            config: self.config,
            raster: self.raster,
            bands,
        }
    }

    /// Binarize and trace the raster as one black layer on white.
    ///
    /// The threshold is [`VectorizeConfig::threshold`] unless
    /// `adaptive_threshold` is set.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Trace`] if the tracer fails and the
    /// failure policy is [`TraceFailurePolicy::Abort`].
    pub fn trace_single(self) -> Result<Traced, PipelineError> {
        let threshold = if self.config.adaptive_threshold {
            crate::threshold::adaptive_threshold(&self.raster)
        } else {
            self.config.threshold
        };
        let dimensions = Dimensions::of(&self.raster);
        let mask = crate::mask::binarize(&self.raster, threshold);
        drop(self.raster);
        tracing::debug!(
            threshold,
            ink = crate::mask::member_count(&mask),
            "single-band binarized"
        );

        let result = trace_layer(&mask, Rgb::BLACK, 0, &self.config.tracer, &self.config.trace);
        let (layers, skipped) = apply_policy(vec![result], self.config.on_trace_failure)?;
        Ok(Traced {
            dimensions,
            background: Some(Rgb::WHITE),
            layers,
            skipped,
        })
    }
}

// ───────────────────────── Stage 2: Partitioned ──────────────────────

/// Pipeline state after band partitioning.
#[must_use = "pipeline stages are consumed by advancing, call .trace_bands() to continue"]
pub struct Partitioned {
    config: VectorizeConfig,
    raster: RgbImage,
    bands: Vec<Band>,
}

impl Partitioned {
    /// The bands in paint order.
    #[must_use]
    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// The working raster.
    #[must_use]
    pub const fn raster(&self) -> &RgbImage {
        &self.raster
    }

    /// Build and trace every band's mask on the rayon pool.
    ///
    /// Band order is preserved. Layers that traced no geometry are
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns the first (in band order) [`PipelineError::Trace`] when the
    /// failure policy is [`TraceFailurePolicy::Abort`].
    pub fn trace_bands(self) -> Result<Traced, PipelineError> {
        let config = &self.config;
        let raster = &self.raster;
        let results: Vec<Result<Layer, PipelineError>> = self
            .bands
            .par_iter()
            .map(|band| {
                let _span = tracing::info_span!("band", index = band.index).entered();
                let (mask, color) = crate::mask::build_mask(raster, band);
                trace_layer(&mask, color, band.index, &config.tracer, &config.trace)
            })
            .collect();

        let (layers, skipped) = apply_policy(results, config.on_trace_failure)?;
        let before = layers.len();
        let layers: Vec<Layer> = layers.into_iter().filter(|l| !l.is_empty()).collect();
        tracing::debug!(
            bands = self.bands.len(),
            layers = layers.len(),
            empty = before - layers.len(),
            skipped = skipped.len(),
            "traced bands"
        );

        Ok(Traced {
            dimensions: Dimensions::of(raster),
            background: None,
            layers,
            skipped,
        })
    }
}

/// Split per-band results into layers and skipped diagnostics.
fn apply_policy(
    results: Vec<Result<Layer, PipelineError>>,
    policy: TraceFailurePolicy,
) -> Result<(Vec<Layer>, Vec<SkippedBand>), PipelineError> {
    let mut layers = Vec::with_capacity(results.len());
    let mut skipped = Vec::new();
    for result in results {
        match (result, policy) {
            (Ok(layer), _) => layers.push(layer),
            (Err(err), TraceFailurePolicy::Abort) => return Err(err),
            (Err(PipelineError::Trace { band, message }), TraceFailurePolicy::Skip) => {
                tracing::warn!(band, %message, "skipping band that failed to trace");
                skipped.push(SkippedBand { band, message });
            }
            (Err(err), TraceFailurePolicy::Skip) => return Err(err),
        }
    }
    Ok((layers, skipped))
}

// ───────────────────────── Stage 3: Traced ───────────────────────────

/// Terminal state: vector layers ready for composition.
#[must_use = "call .into_document() to extract the Vectorized result"]
pub struct Traced {
    dimensions: Dimensions,
    background: Option<Rgb>,
    layers: Vec<Layer>,
    skipped: Vec<SkippedBand>,
}

impl Traced {
    /// The traced layers in paint order.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Bands omitted under [`TraceFailurePolicy::Skip`].
    #[must_use]
    pub fn skipped(&self) -> &[SkippedBand] {
        &self.skipped
    }

    /// Consume the pipeline and return the composed document.
    #[must_use]
    pub fn into_document(self) -> Vectorized {
        Vectorized {
            dimensions: self.dimensions,
            background: self.background,
            layers: self.layers,
            skipped: self.skipped,
        }
    }
}

/// Entry point for the incremental pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Store the upload bytes and config. No processing is performed.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: VectorizeConfig) -> Received {
        Received {
            config,
            source: image_bytes,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::partition::PartitionStrategy;
    use crate::trace::TracerKind;

    /// Encode a 100x100 red square on white as PNG.
    fn red_square_png() -> Vec<u8> {
        let img = image::RgbaImage::from_fn(100, 100, |x, y| {
            if (25..75).contains(&x) && (25..75).contains(&y) {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        });
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

    fn config(colors: u32) -> VectorizeConfig {
        VectorizeConfig {
            colors,
            tracer: TracerKind::BorderFollowing,
            ..VectorizeConfig::default()
        }
    }

    #[test]
    fn preprocess_rejects_invalid_config_before_decoding() {
        let mut cfg = VectorizeConfig::default();
        cfg.preprocess.long_side = 0;
        let result = Pipeline::new(red_square_png(), cfg).preprocess();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn preprocess_reports_empty_input() {
        let result = Pipeline::new(Vec::new(), VectorizeConfig::default()).preprocess();
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn single_band_is_black_on_white() {
        let pre = Pipeline::new(red_square_png(), config(1)).preprocess().unwrap();
        assert!(pre.is_single_band());
        let doc = pre.trace_single().unwrap().into_document();
        assert_eq!(doc.background, Some(Rgb::WHITE));
        assert_eq!(doc.layers.len(), 1);
        assert_eq!(doc.layers[0].fill, Rgb::BLACK);
        // Red is darker than 128, so the square is ink.
        assert!(!doc.layers[0].is_empty());
        assert_eq!(
            doc.dimensions,
            Dimensions {
                width: 100,
                height: 100
            }
        );
    }

    #[test]
    fn single_band_keeps_empty_layer() {
        let cfg = VectorizeConfig {
            threshold: 10,
            ..config(1)
        };
        let doc = Pipeline::new(red_square_png(), cfg)
            .preprocess()
            .unwrap()
            .trace_single()
            .unwrap()
            .into_document();
        assert_eq!(doc.layers.len(), 1);
        assert!(doc.layers[0].is_empty());
    }

    #[test]
    fn two_bands_of_red_square() {
        let partitioned = Pipeline::new(red_square_png(), config(2))
            .preprocess()
            .unwrap()
            .partition();
        assert_eq!(partitioned.bands().len(), 2);
        assert_eq!(partitioned.raster().dimensions(), (100, 100));
        let traced = partitioned.trace_bands().unwrap();
        assert_eq!(traced.layers().len(), 2);
        assert!(traced.skipped().is_empty());
        let doc = traced.into_document();
        assert_eq!(doc.background, None);
        assert!(doc.layers.iter().all(|l| !l.paths[0].d.is_empty()));
    }

    #[test]
    fn empty_bands_are_dropped() {
        // Three equal-range bands over a two-color image leave the middle
        // band empty.
        let doc = Pipeline::new(red_square_png(), config(3))
            .preprocess()
            .unwrap()
            .partition()
            .trace_bands()
            .unwrap()
            .into_document();
        assert_eq!(doc.layers.len(), 2);
        assert_eq!(doc.layers[0].band_index, 0);
        assert_eq!(doc.layers[1].band_index, 2);
    }

    #[test]
    fn layer_count_never_exceeds_request() {
        for strategy in PartitionStrategy::ALL {
            for colors in 2..=6 {
                let mut cfg = config(colors);
                cfg.partition.strategy = strategy;
                let doc = Pipeline::new(red_square_png(), cfg)
                    .preprocess()
                    .unwrap()
                    .partition()
                    .trace_bands()
                    .unwrap()
                    .into_document();
                assert!(doc.layers.len() <= colors as usize, "{strategy} n={colors}");
                assert!(doc.layers.iter().all(|l| !l.is_empty()));
            }
        }
    }

    fn failing(band: usize) -> Result<Layer, PipelineError> {
        Err(PipelineError::Trace {
            band,
            message: "bad mask".into(),
        })
    }

    fn ok_layer(band_index: usize) -> Result<Layer, PipelineError> {
        Ok(Layer {
            band_index,
            fill: Rgb::BLACK,
            paths: vec![],
        })
    }

    #[test]
    fn abort_policy_returns_first_failure() {
        let err = apply_policy(
            vec![ok_layer(0), failing(1), failing(2)],
            TraceFailurePolicy::Abort,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Trace { band: 1, .. }));
    }

    #[test]
    fn skip_policy_records_failures() {
        let (layers, skipped) = apply_policy(
            vec![ok_layer(0), failing(1), ok_layer(2)],
            TraceFailurePolicy::Skip,
        )
        .unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(
            skipped,
            vec![SkippedBand {
                band: 1,
                message: "bad mask".into()
            }]
        );
    }
}
