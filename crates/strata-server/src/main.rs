//! HTTP front end for the strata vectorizer.
//!
//! `POST /trace` takes a multipart upload (field `image`) and returns
//! `image/svg+xml`; tuning knobs ride in the query string. `GET /healthz`
//! answers `ok`. The CPU-bound pipeline runs on the blocking pool so the
//! async runtime stays responsive.

mod error;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use clap::Parser;
use serde::Deserialize;
use strata_pipeline::{PartitionStrategy, TraceFailurePolicy, TracerKind, VectorizeConfig};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, info, info_span};
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

#[derive(Parser, Debug)]
#[command(author, version, about = "strata vectorizer HTTP server")]
struct Args {
    /// TCP listener (e.g. 0.0.0.0:3000)
    #[arg(long, default_value = "0.0.0.0:3000")]
    listen: SocketAddr,
    /// Maximum upload size in bytes
    #[arg(long, default_value_t = 20 * 1024 * 1024)]
    max_upload_bytes: usize,
    /// Answer 504 after this many seconds (0 = no limit). The blocking
    /// vectorize job is not cancelled and keeps its worker until it ends.
    #[arg(long, default_value_t = 0)]
    timeout_secs: u64,
}

struct AppState {
    timeout: Option<Duration>,
    next_request_id: AtomicU64,
}

/// Query parameters accepted by `POST /trace`.
///
/// Short names (`omit`, `th`, `lt`, `qt`) are what the bundled web UI
/// sends; the long names are accepted as aliases. Fields are flat so
/// `serde_urlencoded` can parse numbers.
#[derive(Debug, Default, Deserialize)]
struct TraceQuery {
    colors: Option<u32>,
    long: Option<u32>,
    strategy: Option<String>,
    tracer: Option<String>,
    #[serde(alias = "turd_size")]
    omit: Option<u32>,
    blur: Option<f32>,
    median: Option<u32>,
    #[serde(alias = "threshold")]
    th: Option<u8>,
    adaptive: Option<bool>,
    #[serde(alias = "length_threshold")]
    lt: Option<f64>,
    #[serde(alias = "corner_threshold")]
    qt: Option<i32>,
    tolerance: Option<u32>,
    skip_failed: Option<bool>,
    #[serde(default)]
    outline: bool,
}

impl TraceQuery {
    /// Overlay the provided parameters on the default config.
    fn to_config(&self) -> Result<VectorizeConfig, AppError> {
        let mut config = VectorizeConfig::default();
        if let Some(colors) = self.colors {
            config.colors = strata_pipeline::clamp_color_count(colors);
        }
        if let Some(long) = self.long {
            config.preprocess.long_side = long;
        }
        if let Some(ref s) = self.strategy {
            config.partition.strategy = s
                .parse::<PartitionStrategy>()
                .map_err(AppError::BadRequest)?;
        }
        if let Some(ref t) = self.tracer {
            config.tracer = t.parse::<TracerKind>().map_err(AppError::BadRequest)?;
        }
        if let Some(omit) = self.omit {
            config.trace.turd_size = omit;
        }
        if let Some(blur) = self.blur {
            config.preprocess.blur_sigma = blur;
        }
        if let Some(median) = self.median {
            config.preprocess.median_radius = median;
        }
        if let Some(th) = self.th {
            config.threshold = th;
        }
        if let Some(adaptive) = self.adaptive {
            config.adaptive_threshold = adaptive;
        }
        if let Some(lt) = self.lt {
            config.trace.length_threshold = lt;
        }
        if let Some(qt) = self.qt {
            config.trace.corner_threshold = qt;
        }
        if let Some(tolerance) = self.tolerance {
            config.partition.color_tolerance = tolerance;
        }
        if self.skip_failed == Some(true) {
            config.on_trace_failure = TraceFailurePolicy::Skip;
        }
        Ok(config)
    }
}

fn app(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/trace", post(trace_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let state = Arc::new(AppState {
        timeout: (args.timeout_secs > 0).then(|| Duration::from_secs(args.timeout_secs)),
        next_request_id: AtomicU64::new(1),
    });

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("bind {}", args.listen))?;
    info!("strata server listening on {}", args.listen);

    axum::serve(listener, app(state, args.max_upload_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn trace_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TraceQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let request_id = state.next_request_id.fetch_add(1, Ordering::Relaxed);
    let span = info_span!("trace", request_id);
    handle_trace(state, query, multipart)
        .instrument(span)
        .await
}

async fn handle_trace(
    state: Arc<AppState>,
    query: Result<Query<TraceQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let config = query.to_config()?;

    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InternalIo(e.body_text()))?
    {
        if field.name() == Some("image") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::InternalIo(e.body_text()))?;
            image = Some(bytes);
            break;
        }
    }
    let image = image.ok_or(AppError::MissingImage)?;
    info!(
        bytes = image.len(),
        colors = config.colors,
        long = config.preprocess.long_side,
        strategy = %config.partition.strategy,
        tracer = %config.tracer,
        "trace request"
    );

    let outline = query.outline;
    let span = tracing::Span::current();
    let work = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        strata_pipeline::process(&image, &config).map(|doc| {
            if outline {
                strata_export::to_outline_svg(&doc)
            } else {
                strata_export::to_svg(&doc)
            }
        })
    });

    let joined = match state.timeout {
        Some(limit) => tokio::time::timeout(limit, work)
            .await
            .map_err(|_| AppError::Timeout)?,
        None => work.await,
    };
    let svg = joined.map_err(|e| AppError::InternalIo(e.to_string()))??;

    info!(svg_bytes = svg.len(), "trace complete");
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}
