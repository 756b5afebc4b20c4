//! Request errors and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use strata_pipeline::PipelineError;
use tracing::{error, warn};

/// Everything a `/trace` request can fail with.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The multipart body had no `image` field.
    #[error("missing multipart field \"image\"")]
    MissingImage,

    /// Malformed query string or request body.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Reading the upload or joining the worker failed.
    #[error("internal I/O error: {0}")]
    InternalIo(String),

    /// The vectorizer did not finish within the configured budget.
    #[error("vectorizing timed out")]
    Timeout,

    /// The pipeline rejected the input or failed to trace it.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl AppError {
    /// Status code this error is reported with.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingImage
            | Self::BadRequest(_)
            | Self::Pipeline(PipelineError::EmptyInput | PipelineError::InvalidConfig(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Pipeline(PipelineError::ImageDecode(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Pipeline(PipelineError::Trace { .. }) | Self::InternalIo(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            error!(%status, error = %message, "request failed");
        } else {
            warn!(%status, error = %message, "request rejected");
        }
        (status, message).into_response()
    }
}
