use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the `hwinstant-api` crate.
///
/// Mirrors the failure modes of the device's local API: the API switch
/// being turned off in the HomeWizard Energy app, transport and HTTP
/// failures, payloads we cannot decode, and firmware we do not speak.
/// `hwinstant-core` sorts these into recoverable and fatal kinds.
#[derive(Debug, Error)]
pub enum Error {
    // ── Device state ────────────────────────────────────────────────
    /// The local API is disabled on the device (HTTP 403).
    #[error("API disabled -- enable the local API in the HomeWizard Energy app")]
    Disabled,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Invalid host or URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Non-success HTTP status other than 403/404.
    #[error("API request error: {message}")]
    Request { message: String },

    /// Endpoint does not exist on this firmware (HTTP 404).
    #[error("Endpoint not found: {path}")]
    NotFound { path: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Platform ────────────────────────────────────────────────────
    /// The device reports an API version this client does not implement.
    #[error("Unsupported API version '{found}', expected 'v1'")]
    UnsupportedApiVersion { found: String },

    /// The client was closed and can no longer issue requests.
    #[error("Client is closed")]
    Closed,
}

impl Error {
    /// Returns `true` when the device's local API is switched off.
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }

    /// Returns `true` for network/protocol failures that the next poll
    /// may well not hit again.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout { .. } | Self::Request { .. } | Self::NotFound { .. }
        )
    }

    /// Returns `true` if the device speaks an API we do not support.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedApiVersion { .. })
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }
}
