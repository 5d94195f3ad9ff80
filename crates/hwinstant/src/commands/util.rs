//! Shared helpers for command handlers.

use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::sync::Arc;

use hwinstant_api::HomeWizardClient;
use hwinstant_core::{
    AbortReason, ClientFactory, CombinedModels, ConfigEntry, Coordinator, FlowErrorCode,
    FlowResult, StandaloneHost, UpdateError,
};

use crate::config::Context;
use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

// ── Setup flow results ──────────────────────────────────────────────

/// Where a flow step left us, once form errors became CLI errors.
#[derive(Debug)]
pub enum FlowOutcome {
    Created(Arc<ConfigEntry>),
    /// Ended without a new entry, but not as a failure.
    Done(AbortReason),
    /// Waiting for the user to confirm; carries the form placeholders.
    Confirm(BTreeMap<String, String>),
}

pub fn settle(result: FlowResult) -> Result<FlowOutcome, CliError> {
    match result {
        FlowResult::CreateEntry { entry } => Ok(FlowOutcome::Created(entry)),
        FlowResult::Form {
            errors,
            placeholders,
            ..
        } => match errors.values().next() {
            Some(FlowErrorCode::ApiNotEnabled) => Err(CliError::ApiDisabled),
            Some(FlowErrorCode::NetworkError) => Err(CliError::ConnectionFailed {
                reason: "the device did not answer".into(),
            }),
            None => Ok(FlowOutcome::Confirm(placeholders)),
        },
        FlowResult::Abort { reason }
            if reason.is_success() || reason == AbortReason::AlreadyConfigured =>
        {
            Ok(FlowOutcome::Done(reason))
        }
        FlowResult::Abort { reason } => Err(CliError::from_abort(reason)),
    }
}

// ── One-shot reads ──────────────────────────────────────────────────

/// Connect to `entry` and run a single refresh.
///
/// The client is closed before returning; the refresh result is handed
/// back separately so callers can still inspect the coordinator state.
pub async fn poll_once(
    ctx: &Context,
    entry: &ConfigEntry,
) -> Result<
    (
        Coordinator<HomeWizardClient>,
        Result<Arc<CombinedModels>, UpdateError>,
    ),
    CliError,
> {
    let client = ctx.factory().connect(&entry.data.ip_address)?;
    let coordinator = Coordinator::new(entry.entry_id.clone(), client, StandaloneHost::new());
    let result = coordinator.refresh().await;
    coordinator.close();
    if let Err(ref e) = result {
        tracing::debug!(entry_id = %entry.entry_id, error = %e, "refresh failed");
    }
    Ok((coordinator, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwinstant_core::{EntryData, FlowSource, FlowStep};

    fn form(error: Option<FlowErrorCode>) -> FlowResult {
        FlowResult::Form {
            step_id: FlowStep::User,
            errors: error
                .map(|code| BTreeMap::from([("base".to_owned(), code)]))
                .unwrap_or_default(),
            placeholders: BTreeMap::from([("name".to_owned(), "P1 meter (abc)".to_owned())]),
        }
    }

    #[test]
    fn form_errors_become_cli_errors() {
        assert!(matches!(
            settle(form(Some(FlowErrorCode::ApiNotEnabled))),
            Err(CliError::ApiDisabled)
        ));
        assert!(matches!(
            settle(form(Some(FlowErrorCode::NetworkError))),
            Err(CliError::ConnectionFailed { .. })
        ));
        assert!(matches!(
            settle(form(None)),
            Ok(FlowOutcome::Confirm(p)) if p["name"] == "P1 meter (abc)"
        ));
    }

    #[test]
    fn benign_aborts_are_not_errors() {
        for reason in [
            AbortReason::AlreadyConfigured,
            AbortReason::ReauthEnableApiSuccessful,
            AbortReason::ReconfigureSuccessful,
        ] {
            assert!(matches!(
                settle(FlowResult::Abort { reason }),
                Ok(FlowOutcome::Done(r)) if r == reason
            ));
        }
        assert!(matches!(
            settle(FlowResult::Abort {
                reason: AbortReason::DeviceNotSupported
            }),
            Err(CliError::Unsupported { .. })
        ));
    }

    #[test]
    fn created_entry_passes_through() {
        let entry = Arc::new(ConfigEntry::new(
            "P1 meter",
            EntryData {
                ip_address: "192.168.1.50".into(),
            },
            None,
            FlowSource::User,
        ));
        assert!(matches!(
            settle(FlowResult::CreateEntry { entry: Arc::clone(&entry) }),
            Ok(FlowOutcome::Created(e)) if e.title == "P1 meter"
        ));
    }

    #[test]
    fn yes_flag_skips_prompt() {
        assert!(matches!(confirm("Remove entry?", true), Ok(true)));
    }
}
