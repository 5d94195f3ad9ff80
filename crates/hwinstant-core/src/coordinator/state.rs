// ── Poll state transition ──
//
// The coordinator's decision logic as a pure function: given the current
// state and the outcome of one fetch, produce the next state, the side
// effects the host must run, and the tick's result. Nothing here does I/O.

use std::sync::Arc;

use hwinstant_api::CombinedModels;

use super::UpdateError;

/// What one `combined()` call produced, already classified.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success(Arc<CombinedModels>),
    /// The device answered that its local API is switched off.
    Disabled,
    /// Network or protocol failure; the next tick is the retry.
    CommunicationError(String),
}

/// Requests for the host, emitted only on state edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Unload and set up the entry again.
    ScheduleReload,
    /// Raise the "local API disabled" issue.
    RaiseIssue,
    /// Clear the "local API disabled" issue.
    ResolveIssue,
}

/// Everything the coordinator remembers between ticks.
#[derive(Debug, Clone, Default)]
pub struct PollState {
    /// Set while the device reports its API disabled.
    pub api_disabled: bool,
    /// Last successfully fetched snapshot, never partially updated.
    pub snapshot: Option<Arc<CombinedModels>>,
}

/// Result of applying one outcome.
#[derive(Debug)]
pub struct Transition {
    pub state: PollState,
    pub effects: Vec<SideEffect>,
    pub result: Result<Arc<CombinedModels>, UpdateError>,
}

impl PollState {
    /// Compute the next state for `outcome`.
    ///
    /// - Success replaces the snapshot wholesale and clears the disabled
    ///   flag, resolving the issue once if the flag was set.
    /// - Disabled sets the flag; only the enabled-to-disabled edge raises
    ///   the issue, and a reload is requested only if there is a snapshot
    ///   to lose (before the first success, setup handles reauth instead).
    /// - A communication error changes nothing.
    pub fn apply(&self, outcome: FetchOutcome) -> Transition {
        match outcome {
            FetchOutcome::Success(data) => {
                let effects = if self.api_disabled {
                    vec![SideEffect::ResolveIssue]
                } else {
                    Vec::new()
                };
                Transition {
                    state: PollState {
                        api_disabled: false,
                        snapshot: Some(Arc::clone(&data)),
                    },
                    effects,
                    result: Ok(data),
                }
            }
            FetchOutcome::Disabled => {
                let mut effects = Vec::new();
                if !self.api_disabled {
                    effects.push(SideEffect::RaiseIssue);
                    if self.snapshot.is_some() {
                        effects.push(SideEffect::ScheduleReload);
                    }
                }
                Transition {
                    state: PollState {
                        api_disabled: true,
                        snapshot: self.snapshot.clone(),
                    },
                    effects,
                    result: Err(UpdateError::ApiDisabled),
                }
            }
            FetchOutcome::CommunicationError(message) => Transition {
                state: self.clone(),
                effects: Vec::new(),
                result: Err(UpdateError::Communication { message }),
            },
        }
    }
}
