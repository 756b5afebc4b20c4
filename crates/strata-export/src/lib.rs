//! strata-export: SVG composition and the one-call entry point (sans-IO).
//!
//! Turns the pipeline's [`Vectorized`] document into SVG text. [`run`]
//! chains the whole pipeline with the compositor for callers that just
//! want bytes in and SVG out.

pub mod svg;

pub use svg::{SvgMetadata, to_outline_svg, to_svg, to_svg_with_metadata};

use strata_pipeline::{PipelineError, VectorizeConfig, Vectorized};

/// Vectorize `image_bytes` and serialize the result as a filled,
/// layered SVG document.
///
/// The number of bands and the working long side come from
/// `config.colors` and `config.preprocess.long_side`.
///
/// # Errors
///
/// Propagates every [`PipelineError`] from [`strata_pipeline::process`];
/// no SVG is produced on failure.
pub fn run(image_bytes: &[u8], config: &VectorizeConfig) -> Result<String, PipelineError> {
    let document: Vectorized = strata_pipeline::process(image_bytes, config)?;
    tracing::info!(
        width = document.dimensions.width,
        height = document.dimensions.height,
        layers = document.layers.len(),
        skipped = document.skipped.len(),
        "vectorized"
    );
    Ok(to_svg(&document))
}
