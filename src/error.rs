use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failures a dashboard request can end with.
///
/// Remote failures are not represented: they shrink the dashboard instead of
/// failing the request.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("missing X-Timestamp header")]
    MissingTimestamp,

    #[error("invalid X-Timestamp header {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl DashboardError {
    pub fn status(&self) -> StatusCode {
        match self {
            DashboardError::MissingTimestamp | DashboardError::InvalidTimestamp { .. } => {
                StatusCode::BAD_REQUEST
            }
            DashboardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<minijinja::Error> for DashboardError {
    fn from(error: minijinja::Error) -> Self {
        DashboardError::Internal(format!("failed to render dashboard: {error}"))
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            DashboardError::Internal(message) => {
                tracing::error!("Dashboard request failed: {}", message);
                (status, "Internal Server Error".to_string()).into_response()
            }
            _ => (status, self.to_string()).into_response(),
        }
    }
}
