// ── Core error types ──
//
// User-facing errors from hwinstant-core. Consumers never see HTTP status
// codes or JSON parse failures directly: the `From<hwinstant_api::Error>`
// impl sorts client failures into the recoverable and fatal kinds the
// coordinator, runtime and setup flow reason about.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Recoverable device errors ────────────────────────────────────
    #[error("The local API of the device is disabled")]
    ApiDisabled,

    #[error("Error while communicating with the device: {message}")]
    CommunicationError { message: String },

    // ── Fatal device errors ──────────────────────────────────────────
    #[error("Device not supported: {product_type}")]
    Unsupported { product_type: String },

    #[error("Device speaks unsupported API version '{found}'")]
    UnsupportedApiVersion { found: String },

    #[error("Wrong device: expected {expected}, found {found}")]
    WrongDevice { expected: String, found: String },

    // ── Entry errors ─────────────────────────────────────────────────
    #[error("Config entry not found: {entry_id}")]
    EntryNotFound { entry_id: String },

    #[error("Config entry {entry_id} not ready: {reason}")]
    EntryNotReady { entry_id: String, reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Errors the next poll or a retried setup may well not hit again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ApiDisabled | Self::CommunicationError { .. } | Self::EntryNotReady { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<hwinstant_api::Error> for CoreError {
    fn from(err: hwinstant_api::Error) -> Self {
        use hwinstant_api::Error as ApiError;

        match err {
            ApiError::Disabled => CoreError::ApiDisabled,
            ApiError::UnsupportedApiVersion { found } => CoreError::UnsupportedApiVersion { found },
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid device address: {e}"),
            },
            ApiError::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Unexpected response from device: {message}"))
            }
            ApiError::Closed => CoreError::Internal("device client already closed".into()),
            e @ (ApiError::Transport(_)
            | ApiError::Timeout { .. }
            | ApiError::Request { .. }
            | ApiError::NotFound { .. }) => CoreError::CommunicationError {
                message: e.to_string(),
            },
        }
    }
}
