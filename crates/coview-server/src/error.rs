use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use coview_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Sign in required: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Storage did not answer in time")]
    Timeout,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Whether the failure is on our side and worth retrying later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServerError::Timeout | ServerError::Storage(_) | ServerError::Internal(_)
        )
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServerError::NotFound("record does not exist".to_string()),
            StoreError::Denied => {
                ServerError::Forbidden("only the author can change this comment".to_string())
            }
            StoreError::Validation(v) => ServerError::BadRequest(v.to_string()),
            other => ServerError::Storage(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if self.is_transient() {
            tracing::error!(error = %self, "request failed");
        }

        let (status, message) = match &self {
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            ServerError::Timeout => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            ServerError::Storage(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable".to_string())
            }
            ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
