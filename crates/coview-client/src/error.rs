use thiserror::Error;

/// Errors produced by the client crate.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The request never got an answer (connection, TLS, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server needs an identified caller.
    #[error("Sign in required: {0}")]
    Unauthorized(String),

    /// The server answered with an error status.
    #[error("Server responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No home directory to keep local state in.
    #[error("Cannot determine data directory")]
    NoDataDir,
}

impl ClientError {
    /// Whether trying the same request again later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(_) => true,
            ClientError::Status { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> ClientError {
        ClientError::Status {
            status,
            message: String::new(),
        }
    }

    #[test]
    fn retryable_statuses() {
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(403).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!ClientError::Unauthorized("x".into()).is_retryable());
    }
}
