//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants and setup-flow outcomes into user-facing
//! errors with actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use hwinstant_config::ConfigError;
use hwinstant_core::{AbortReason, CoreError, UpdateError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const API_DISABLED: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum CliError {
    // ── Device ───────────────────────────────────────────────────────
    #[error("Could not communicate with the meter: {reason}")]
    #[diagnostic(
        code(hwinstant::connection_failed),
        help(
            "Check that the meter is powered and reachable on the local network.\n\
             Try: hwinstant device --ip <address>"
        )
    )]
    ConnectionFailed { reason: String },

    #[error("The local API of the meter is disabled")]
    #[diagnostic(
        code(hwinstant::api_disabled),
        help(
            "Enable it in the HomeWizard Energy app: Settings > Meters > your meter > Local API.\n\
             Then run: hwinstant reauth <entry>"
        )
    )]
    ApiDisabled,

    #[error("Device type '{product_type}' is not supported")]
    #[diagnostic(
        code(hwinstant::unsupported),
        help("Only the HomeWizard Wi-Fi P1 meter (HWE-P1) can be set up.")
    )]
    Unsupported { product_type: String },

    #[error("The meter speaks API version '{found}'")]
    #[diagnostic(
        code(hwinstant::unsupported_api_version),
        help("Only the v1 local API is supported.")
    )]
    UnsupportedApiVersion { found: String },

    #[error("Another device answers at this address")]
    #[diagnostic(
        code(hwinstant::wrong_device),
        help("Expected {expected}, found {found}. Use `hwinstant add` to set up a new meter.")
    )]
    WrongDevice { expected: String, found: String },

    #[error("Entry '{entry_id}' is not ready: {reason}")]
    #[diagnostic(code(hwinstant::not_ready))]
    NotReady { entry_id: String, reason: String },

    // ── Setup flow ───────────────────────────────────────────────────
    #[error("Setup aborted: {reason}")]
    #[diagnostic(code(hwinstant::aborted))]
    Aborted { reason: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(hwinstant::not_found),
        help("Run: hwinstant {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("'{identifier}' matches more than one entry")]
    #[diagnostic(
        code(hwinstant::ambiguous),
        help("Use the entry id from `hwinstant entries list`.")
    )]
    Ambiguous { identifier: String },

    #[error("No entries configured")]
    #[diagnostic(code(hwinstant::no_entries), help("Set up a meter with: hwinstant add <ip>"))]
    NoEntries,

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(hwinstant::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(hwinstant::config),
        help("Check the config file; `hwinstant config path` prints its location.")
    )]
    Config(#[from] ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("'{action}' requires confirmation")]
    #[diagnostic(
        code(hwinstant::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {message}")]
    #[diagnostic(code(hwinstant::internal))]
    Internal { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotReady { .. } => exit_code::CONNECTION,
            Self::ApiDisabled => exit_code::API_DISABLED,
            Self::NotFound { .. } | Self::NoEntries => exit_code::NOT_FOUND,
            Self::Unsupported { .. } | Self::UnsupportedApiVersion { .. } => exit_code::UNSUPPORTED,
            Self::WrongDevice { .. } | Self::Ambiguous { .. } => exit_code::CONFLICT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Error for a flow that ended without reaching its goal.
    pub fn from_abort(reason: AbortReason) -> Self {
        match reason {
            AbortReason::DeviceNotSupported => Self::Unsupported {
                product_type: "unknown".into(),
            },
            AbortReason::UnsupportedApiVersion => Self::UnsupportedApiVersion {
                found: "not v1".into(),
            },
            AbortReason::WrongDevice => Self::WrongDevice {
                expected: "the configured meter".into(),
                found: "a different device".into(),
            },
            other => Self::Aborted {
                reason: other.to_string(),
            },
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ApiDisabled => CliError::ApiDisabled,

            CoreError::CommunicationError { message } => {
                CliError::ConnectionFailed { reason: message }
            }

            CoreError::Unsupported { product_type } => CliError::Unsupported { product_type },

            CoreError::UnsupportedApiVersion { found } => {
                CliError::UnsupportedApiVersion { found }
            }

            CoreError::WrongDevice { expected, found } => CliError::WrongDevice { expected, found },

            CoreError::EntryNotFound { entry_id } => CliError::NotFound {
                resource_type: "entry".into(),
                identifier: entry_id,
                list_command: "entries list".into(),
            },

            CoreError::EntryNotReady { entry_id, reason } => {
                CliError::NotReady { entry_id, reason }
            }

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal { message },
        }
    }
}

impl From<hwinstant_api::Error> for CliError {
    fn from(err: hwinstant_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

impl From<UpdateError> for CliError {
    fn from(err: UpdateError) -> Self {
        CoreError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_keep_their_exit_codes() {
        assert_eq!(
            CliError::from(CoreError::ApiDisabled).exit_code(),
            exit_code::API_DISABLED
        );
        assert_eq!(
            CliError::from(CoreError::CommunicationError {
                message: "timeout".into()
            })
            .exit_code(),
            exit_code::CONNECTION
        );
        assert_eq!(
            CliError::from(CoreError::EntryNotFound {
                entry_id: "x".into()
            })
            .exit_code(),
            exit_code::NOT_FOUND
        );
    }

    #[test]
    fn aborts_map_to_specific_errors() {
        assert!(matches!(
            CliError::from_abort(AbortReason::WrongDevice),
            CliError::WrongDevice { .. }
        ));
        assert!(matches!(
            CliError::from_abort(AbortReason::InvalidDiscoveryParameters),
            CliError::Aborted { ref reason } if reason == "invalid_discovery_parameters"
        ));
    }
}
