//! HTTP error responses.
//!
//! Every error leaves the service as `{"error": "<message>"}`. The messages
//! are fixed strings; extractor details only go to the logs.

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::downloader::VideoReference;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// `url` query parameter absent or empty.
    #[error("URL parameter is required")]
    MissingUrl,

    /// `url` present but not a playable YouTube video.
    #[error("Invalid YouTube video URL")]
    InvalidUrl,

    /// Extraction failed while a JSON answer was still possible.
    #[error("{0}")]
    Internal(&'static str),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingUrl | ApiError::InvalidUrl => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), axum::Json(body)).into_response()
    }
}

// A query string that does not deserialize (e.g. a repeated `url`) never names
// one video.
impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!("rejected query string: {}", rejection.body_text());
        ApiError::InvalidUrl
    }
}

/// Validate the `url` query parameter shared by every route.
pub fn parse_video_param(raw: Option<&str>) -> Result<VideoReference, ApiError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or(ApiError::MissingUrl)?;
    VideoReference::parse(raw).map_err(|_| ApiError::InvalidUrl)
}
