//! HTTP error type shared by all handlers.
//!
//! Every error renders as `{"detail": "<message>"}` with a matching status.

use crate::transcription::TranscriptError;
use crate::video_id::VideoIdError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// The request body or query string could not be decoded.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("{0}")]
    Unavailable(String),

    #[error("Error processing request: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed with {}: {}", status, self);
        }
        let body = ErrorResponse {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<VideoIdError> for ApiError {
    fn from(e: VideoIdError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<TranscriptError> for ApiError {
    fn from(e: TranscriptError) -> Self {
        match &e {
            TranscriptError::NoTranscript => ApiError::BadRequest(e.to_string()),
            TranscriptError::NotConfigured => ApiError::Unavailable(e.to_string()),
            TranscriptError::Upstream { status, .. } => {
                // Only error statuses are passed through as-is
                let status = StatusCode::from_u16(*status)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                ApiError::Upstream {
                    status,
                    message: e.to_string(),
                }
            }
            TranscriptError::Unavailable(_) => ApiError::Upstream {
                status: StatusCode::BAD_GATEWAY,
                message: e.to_string(),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

/// `Json` extractor whose rejections render as `{"detail": ...}`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` extractor whose rejections render as `{"detail": ...}`.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(format!("{:#}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn invalid_url_is_bad_request() {
        let (status, body) = render(VideoIdError::NoMatch.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            serde_json::json!({"detail": "Could not extract video ID from URL"})
        );
    }

    #[tokio::test]
    async fn transcript_errors_map_to_statuses() {
        let (status, body) = render(TranscriptError::NoTranscript.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "No transcript found for this video");

        let upstream = TranscriptError::Upstream {
            status: 429,
            body: "slow down".to_string(),
        };
        let (status, body) = render(upstream.into()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["detail"], "Failed to get transcript: slow down");

        let odd = TranscriptError::Upstream {
            status: 302,
            body: "moved".to_string(),
        };
        assert_eq!(ApiError::from(odd).status_code(), StatusCode::BAD_GATEWAY);

        assert_eq!(
            ApiError::from(TranscriptError::NotConfigured).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn internal_errors_keep_context() {
        let err = anyhow::anyhow!("disk full").context("saving transcript");
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["detail"],
            "Error processing request: saving transcript: disk full"
        );
    }
}
