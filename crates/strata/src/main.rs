//! strata: vectorize a raster image into a layered flat-color SVG.
//!
//! Reads an image file, runs the band pipeline with the given
//! parameters, and writes the SVG to a file or stdout. Useful for:
//!
//! - Comparing partition strategies (`equal-range` vs `k-means` ...)
//! - Tuning speckle size and curve-fitting thresholds
//! - Inspecting the bands a given image splits into (`--print-bands`)
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin strata -- [OPTIONS] <INPUT>
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use strata_pipeline::{
    PartitionStrategy, Pipeline, ResizeFilter, TraceFailurePolicy, TracerKind, VectorizeConfig,
};
use tracing_subscriber::EnvFilter;

/// Convert raster logos and illustrations into layered flat-color SVG.
#[derive(Parser, Debug)]
#[command(name = "strata", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP, GIF).
    input: PathBuf,

    /// Write the SVG here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of color bands (1 = black on white, clamped to 1-6).
    #[arg(long, default_value_t = VectorizeConfig::DEFAULT_COLORS)]
    colors: u32,

    /// Length of the longer side of the working raster in pixels.
    #[arg(
        long = "long",
        default_value_t = strata_pipeline::PreprocessConfig::DEFAULT_LONG_SIDE,
        value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..)
    )]
    long_side: u32,

    /// How pixels are split into bands.
    #[arg(long, value_enum, default_value_t = Strategy::EqualRange)]
    strategy: Strategy,

    /// Boundary tracer.
    #[arg(long, value_enum, default_value_t = Tracer::Spline)]
    tracer: Tracer,

    /// Resampling filter used when shrinking.
    #[arg(long, value_enum, default_value_t = Filter::Triangle)]
    resize_filter: Filter,

    /// Gaussian blur sigma before denoising (0 disables).
    #[arg(long, default_value_t = 0.0)]
    blur: f32,

    /// Median filter radius (0 disables).
    #[arg(long, default_value_t = strata_pipeline::PreprocessConfig::DEFAULT_MEDIAN_RADIUS)]
    median: u32,

    /// Minimum feature size in pixels; smaller specks are dropped.
    #[arg(long, default_value_t = strata_pipeline::TraceParams::DEFAULT_TURD_SIZE)]
    turd_size: u32,

    /// Corner threshold in degrees for curve fitting.
    #[arg(long, default_value_t = strata_pipeline::TraceParams::DEFAULT_CORNER_THRESHOLD)]
    corner_threshold: i32,

    /// Minimum segment length for curve fitting.
    #[arg(long, default_value_t = strata_pipeline::TraceParams::DEFAULT_LENGTH_THRESHOLD)]
    length_threshold: f64,

    /// Single-band binarization threshold.
    #[arg(long, default_value_t = VectorizeConfig::DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Derive the single-band threshold from image statistics.
    #[arg(long)]
    adaptive: bool,

    /// Squared RGB distance tolerance for k-means band masks.
    #[arg(long, default_value_t = strata_pipeline::PartitionConfig::DEFAULT_COLOR_TOLERANCE)]
    tolerance: u32,

    /// Seed for k-means centroid sampling.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Omit bands that fail to trace instead of aborting.
    #[arg(long)]
    skip_failed: bool,

    /// Emit the stroke-only outline preview instead of filled layers.
    #[arg(long)]
    outline: bool,

    /// Print the band table to stderr before tracing.
    #[arg(long)]
    print_bands: bool,

    /// Full vectorize config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Partition strategy selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Strategy {
    /// Equal-width luma intervals.
    EqualRange,
    /// Luma intervals with equal pixel counts.
    EqualFrequency,
    /// k-means clustering in RGB.
    #[value(alias = "kmeans")]
    KMeans,
    /// Uniform per-channel quantization.
    Posterize,
}

/// Tracer selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Tracer {
    /// Spline fitting (smooth curves).
    Spline,
    /// Polygon fitting.
    Polygon,
    /// Pixel border following with RDP simplification.
    BorderFollowing,
}

/// Resize filter selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

impl From<Strategy> for PartitionStrategy {
    fn from(s: Strategy) -> Self {
        match s {
            Strategy::EqualRange => Self::EqualRange,
            Strategy::EqualFrequency => Self::EqualFrequency,
            Strategy::KMeans => Self::KMeans,
            Strategy::Posterize => Self::Posterize,
        }
    }
}

impl From<Tracer> for TracerKind {
    fn from(t: Tracer) -> Self {
        match t {
            Tracer::Spline => Self::Spline,
            Tracer::Polygon => Self::Polygon,
            Tracer::BorderFollowing => Self::BorderFollowing,
        }
    }
}

impl From<Filter> for ResizeFilter {
    fn from(f: Filter) -> Self {
        match f {
            Filter::Nearest => Self::Nearest,
            Filter::Triangle => Self::Triangle,
            Filter::CatmullRom => Self::CatmullRom,
            Filter::Gaussian => Self::Gaussian,
            Filter::Lanczos3 => Self::Lanczos3,
        }
    }
}

/// Build a [`VectorizeConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> anyhow::Result<VectorizeConfig> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).context("parsing --config-json");
    }

    let mut config = VectorizeConfig {
        colors: cli.colors,
        tracer: cli.tracer.into(),
        threshold: cli.threshold,
        adaptive_threshold: cli.adaptive,
        on_trace_failure: if cli.skip_failed {
            TraceFailurePolicy::Skip
        } else {
            TraceFailurePolicy::Abort
        },
        ..VectorizeConfig::default()
    };
    config.preprocess.long_side = cli.long_side;
    config.preprocess.resize_filter = cli.resize_filter.into();
    config.preprocess.blur_sigma = cli.blur;
    config.preprocess.median_radius = cli.median;
    config.partition.strategy = cli.strategy.into();
    config.partition.color_tolerance = cli.tolerance;
    config.partition.kmeans_seed = cli.seed;
    config.trace.turd_size = cli.turd_size;
    config.trace.corner_threshold = cli.corner_threshold;
    config.trace.length_threshold = cli.length_threshold;
    Ok(config)
}

/// Run the pipeline stage by stage so the band table can be shown.
fn vectorize(
    bytes: Vec<u8>,
    config: VectorizeConfig,
    print_bands: bool,
) -> anyhow::Result<strata_pipeline::Vectorized> {
    let start = Instant::now();
    let preprocessed = Pipeline::new(bytes, config).preprocess()?;
    let (w, h) = preprocessed.raster().dimensions();
    tracing::info!(width = w, height = h, elapsed = ?start.elapsed(), "preprocessed");

    let traced = if preprocessed.is_single_band() {
        preprocessed.trace_single()?
    } else {
        let partitioned = preprocessed.partition();
        if print_bands {
            eprintln!("{:<6} {:<9} {:>10}  predicate", "band", "color", "pixels");
            for band in partitioned.bands() {
                eprintln!(
                    "{:<6} {:<9} {:>10}  {:?}",
                    band.index, band.color, band.pixel_count, band.predicate
                );
            }
        }
        partitioned.trace_bands()?
    };
    tracing::info!(
        layers = traced.layers().len(),
        skipped = traced.skipped().len(),
        elapsed = ?start.elapsed(),
        "traced"
    );
    Ok(traced.into_document())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = config_from_cli(&cli)?;

    let image_bytes = std::fs::read(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    tracing::info!(
        input = %cli.input.display(),
        bytes = image_bytes.len(),
        colors = config.colors,
        strategy = %config.partition.strategy,
        tracer = %config.tracer,
        "vectorizing"
    );

    let document = vectorize(image_bytes, config.clone(), cli.print_bands)?;

    let svg = if cli.outline {
        strata_export::to_outline_svg(&document)
    } else {
        let title = cli
            .input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("strata");
        let desc = serde_json::to_string(&config)?;
        strata_export::to_svg_with_metadata(
            &document,
            &strata_export::SvgMetadata {
                title: Some(title),
                description: Some(&desc),
            },
        )
    };

    match cli.output {
        Some(ref path) => {
            std::fs::write(path, &svg).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(output = %path.display(), bytes = svg.len(), "SVG written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(svg.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
