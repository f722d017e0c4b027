use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Identity provider failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("identity provider is unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("identity provider rejected the request ({status})")]
    Rejected { status: StatusCode },

    #[error("identity provider returned an unreadable response: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Hosted document store failures, reads and writes alike.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store is unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("document store rejected the request ({status})")]
    Rejected { status: StatusCode },

    #[error("document store returned an unreadable response: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Signup flow failures.
#[derive(Debug, Error)]
pub enum SignupError {
    #[error("could not create an anonymous identity: {0}")]
    Auth(#[from] AuthError),

    /// The identity was issued but its profile document was not written.
    /// Nothing rolls the identity back; it stays orphaned until a retry.
    #[error("identity created but saving the profile failed: {0}")]
    ProfileWrite(#[source] StoreError),
}

/// Weather upstream failures.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Upstream answered with a non-success status; its raw body is relayed.
    #[error("Weather API failed: {body}")]
    Upstream { status: StatusCode, body: String },

    #[error("{0}")]
    Transport(#[from] reqwest::Error),
}

impl IntoResponse for WeatherError {
    fn into_response(self) -> Response {
        error!("Weather fetch failed: {}", self);
        let status = match &self {
            WeatherError::Upstream { status, .. } => *status,
            WeatherError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Chat backend failures.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("could not reach the chat backend: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server returned {0}")]
    Status(StatusCode),

    #[error("no reply from the chat backend within {0:?}")]
    Timeout(Duration),
}
