use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use chatter_store::StoreError;
use chatter_types::api::AckResponse;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("User already exists")]
    UserExists(String),

    #[error("User does not exist")]
    UserNotFound(String),

    #[error("{0}")]
    InvalidInput(&'static str),

    /// Every compare-and-set attempt lost to a concurrent writer.
    #[error("Too many concurrent updates to {0}, retry later")]
    Contended(&'static str),

    #[error("Store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("Stored value under {key} is corrupt: {source}")]
    Corrupt {
        key: &'static str,
        source: serde_json::Error,
    },

    #[error("Failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UserExists(_) | Self::UserNotFound(_) => StatusCode::CONFLICT,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Contended(_) | Self::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Corrupt { .. } | Self::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The same request may succeed if sent again.
    pub fn is_retryable(&self) -> bool {
        self.status() == StatusCode::SERVICE_UNAVAILABLE
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = Json(AckResponse {
            status: status.as_u16(),
            message: self.to_string(),
        });

        if self.is_retryable() {
            (status, [(header::RETRY_AFTER, "1")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn precondition_failures_are_conflicts() {
        assert_eq!(ChatError::UserExists("a".into()).status(), StatusCode::CONFLICT);
        assert_eq!(ChatError::UserNotFound("a".into()).status(), StatusCode::CONFLICT);
        assert!(!ChatError::UserExists("a".into()).is_retryable());
    }

    #[test]
    fn store_faults_are_retryable() {
        let err = ChatError::from(StoreError::Timeout(Duration::from_secs(2)));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.is_retryable());
        assert!(ChatError::Contended("active_users").is_retryable());

        let resp = err.into_response();
        assert_eq!(resp.headers().get(header::RETRY_AFTER).unwrap(), "1");
    }
}
