//! HTTP boundary errors.
//!
//! Payment failures are not errors at this layer: they travel inside the
//! verification and settlement outcomes. Only requests that cannot be read at
//! all end up here.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors returned by the facilitator routes.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorError {
    /// The body is not a JSON `{payload, details}` object.
    #[error("invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),
}

impl IntoResponse for FacilitatorError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
