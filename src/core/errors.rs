use axum::http::{header, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failure taxonomy for the question-answering pipeline.
///
/// `RateLimited` is decided at the upstream provider boundary (HTTP 429,
/// with any Retry-After hint) and is the only variant surfaced verbatim to
/// callers. Everything else collapses to a fixed generic body so internal
/// detail stays in the logs.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("rate limited by upstream provider")]
    RateLimited { retry_after: Option<u64> },
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("completion failed: {0}")]
    Completion(String),
    #[error("no passages matched the query or fallback patterns")]
    RetrievalEmpty,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded. Please try again later.".to_string(),
            ),
            ApiError::Embedding(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error creating embeddings".to_string(),
            ),
            ApiError::RetrievalEmpty => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "No relevant passages found".to_string(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Completion(_) | ApiError::Transport(_) | ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            ),
        };

        let body = Json(json!({ "error": message }));
        let mut response = (status, body).into_response();

        if let ApiError::RateLimited {
            retry_after: Some(seconds),
        } = &self
        {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}
