use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::tnc::TncError;

/// Every way an API request can fail, from authentication down to a
/// backed-up TNC queue.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str),
    Forbidden {
        operator: String,
        queue: &'static str,
    },
    Validation(String),
    NotFound(&'static str),
    /// The outbound queue is at depth while the link is down.
    QueueFull(&'static str),
    SessionStopped,
}

impl From<TncError> for ApiError {
    fn from(e: TncError) -> Self {
        match e {
            TncError::QueueClosed => ApiError::SessionStopped,
            TncError::QueueFull(queue) => ApiError::QueueFull(queue),
            TncError::Payload(e) => ApiError::Validation(e.to_string()),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::QueueFull(_) | ApiError::SessionStopped => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn body(self) -> ErrorResponse {
        match self {
            ApiError::Unauthorized(reason) => ErrorResponse::new(reason, None),
            ApiError::Forbidden { operator, queue } => ErrorResponse::new(
                "forbidden",
                Some(format!("{} may not use the {} queue", operator, queue)),
            ),
            ApiError::Validation(msg) => ErrorResponse::new("validation_failed", Some(msg)),
            ApiError::NotFound(reason) => ErrorResponse::new(reason, None),
            ApiError::QueueFull(queue) => ErrorResponse::new(
                "queue_full",
                Some(format!("{} queue is full while the TNC is unreachable", queue)),
            ),
            ApiError::SessionStopped => ErrorResponse::new("tnc_session_stopped", None),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable reason, e.g. `queue_full`.
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: &str, detail: Option<String>) -> Self {
        ErrorResponse {
            error: error.to_string(),
            detail,
        }
    }
}
