//! Run lifecycle — the ordered state space a run moves through.
//!
//! A run only ever moves forward along [`RunState::canonical`]. The two
//! out-of-band exits, `Cancelled` and `Aborted`, are reachable from any
//! non-terminal state and absorb the run.
//!
//! ```text
//! Initializing → Provisioning → Executing → SendingReports → Ready → Finalizing → Done
//!       │              │             │              │            │          │
//!       └──────────────┴─────────────┴──────┬───────┴────────────┴──────────┘
//!                                           ▼
//!                                  Cancelled | Aborted
//! ```
//!
//! Because the sequence is a plain ordered slice, "what is left to run" for
//! a resumed run is a suffix of that slice and needs no transition log.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by misuse of the run state model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: RunState, to: RunState },

    #[error("unknown run state: {0}")]
    UnknownState(String),
}

/// State of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    Initializing,
    Provisioning,
    Executing,
    SendingReports,
    Ready,
    Finalizing,
    Done,
    Cancelled,
    Aborted,
}

/// Normal forward progression of a run.
const CANONICAL: [RunState; 7] = [
    RunState::Initializing,
    RunState::Provisioning,
    RunState::Executing,
    RunState::SendingReports,
    RunState::Ready,
    RunState::Finalizing,
    RunState::Done,
];

impl RunState {
    /// The canonical, totally ordered sequence of non-exceptional states.
    pub fn canonical() -> &'static [RunState] {
        &CANONICAL
    }

    /// Position in the canonical sequence, or `None` for `Cancelled`/`Aborted`.
    pub fn index(self) -> Option<usize> {
        CANONICAL.iter().position(|s| *s == self)
    }

    /// `Done`, `Cancelled` and `Aborted` admit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Cancelled | RunState::Aborted)
    }

    /// `Cancelled` and `Aborted` — reachable from any non-terminal state.
    pub fn is_exit(self) -> bool {
        matches!(self, RunState::Cancelled | RunState::Aborted)
    }

    /// Immediate successor in the canonical sequence.
    pub fn next(self) -> Option<RunState> {
        let idx = self.index()?;
        CANONICAL.get(idx + 1).copied()
    }

    /// Every state strictly after `self` in canonical order.
    ///
    /// Empty for `Done` and for the out-of-band terminal states.
    pub fn states_after(self) -> &'static [RunState] {
        match self.index() {
            Some(idx) => &CANONICAL[idx + 1..],
            None => &[],
        }
    }

    /// Canonical name, as persisted and printed.
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Initializing => "Initializing",
            RunState::Provisioning => "Provisioning",
            RunState::Executing => "Executing",
            RunState::SendingReports => "SendingReports",
            RunState::Ready => "Ready",
            RunState::Finalizing => "Finalizing",
            RunState::Done => "Done",
            RunState::Cancelled => "Cancelled",
            RunState::Aborted => "Aborted",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunState {
    type Err = LifecycleError;

    /// Parse a canonical state name. Matching ignores ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [RunState; 9] = [
            RunState::Initializing,
            RunState::Provisioning,
            RunState::Executing,
            RunState::SendingReports,
            RunState::Ready,
            RunState::Finalizing,
            RunState::Done,
            RunState::Cancelled,
            RunState::Aborted,
        ];
        ALL.iter()
            .copied()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LifecycleError::UnknownState(s.to_string()))
    }
}

/// Validate a move from `current` to `target`.
///
/// Legal moves are strictly forward along the canonical sequence, or into
/// `Cancelled`/`Aborted` from any non-terminal state. Returns `target` on
/// success.
pub fn transition(current: RunState, target: RunState) -> Result<RunState, LifecycleError> {
    let invalid = || LifecycleError::InvalidTransition {
        from: current,
        to: target,
    };

    if current.is_terminal() {
        return Err(invalid());
    }
    if target.is_exit() {
        return Ok(target);
    }

    match (current.index(), target.index()) {
        (Some(from), Some(to)) if to > from => Ok(target),
        _ => Err(invalid()),
    }
}

/// Every state strictly after `state`; see [`RunState::states_after`].
pub fn states_after(state: RunState) -> &'static [RunState] {
    state.states_after()
}

/// Resolve a state by name and return the states after it.
///
/// Fails with [`LifecycleError::UnknownState`] if the name is not a run state.
pub fn states_after_named(name: &str) -> Result<&'static [RunState], LifecycleError> {
    let state: RunState = name.parse()?;
    Ok(state.states_after())
}

/// See [`RunState::is_terminal`].
pub fn is_terminal(state: RunState) -> bool {
    state.is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RunState; 9] = [
        RunState::Initializing,
        RunState::Provisioning,
        RunState::Executing,
        RunState::SendingReports,
        RunState::Ready,
        RunState::Finalizing,
        RunState::Done,
        RunState::Cancelled,
        RunState::Aborted,
    ];

    #[test]
    fn forward_transitions_succeed() {
        for (i, from) in CANONICAL.iter().enumerate() {
            for to in &CANONICAL[i + 1..] {
                if from.is_terminal() {
                    continue;
                }
                assert_eq!(transition(*from, *to), Ok(*to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn backward_and_same_state_transitions_fail() {
        for (i, from) in CANONICAL.iter().enumerate() {
            for to in &CANONICAL[..=i] {
                assert_eq!(
                    transition(*from, *to),
                    Err(LifecycleError::InvalidTransition {
                        from: *from,
                        to: *to
                    })
                );
            }
        }
    }

    #[test]
    fn ready_to_provisioning_is_invalid() {
        let err = transition(RunState::Ready, RunState::Provisioning).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }

    #[test]
    fn exits_reachable_from_every_non_terminal_state() {
        for from in CANONICAL.iter().filter(|s| !s.is_terminal()) {
            assert_eq!(transition(*from, RunState::Cancelled), Ok(RunState::Cancelled));
            assert_eq!(transition(*from, RunState::Aborted), Ok(RunState::Aborted));
        }
    }

    #[test]
    fn terminal_states_absorb() {
        for from in [RunState::Done, RunState::Cancelled, RunState::Aborted] {
            for to in ALL {
                assert!(transition(from, to).is_err(), "{from} -> {to} should fail");
            }
        }
    }

    #[test]
    fn states_after_is_proper_suffix() {
        for (i, state) in CANONICAL.iter().enumerate() {
            let rest = state.states_after();
            assert_eq!(rest.len(), CANONICAL.len() - i - 1);
            assert_eq!(rest, &CANONICAL[i + 1..]);
        }
    }

    #[test]
    fn states_after_executing() {
        assert_eq!(
            states_after(RunState::Executing),
            &[
                RunState::SendingReports,
                RunState::Ready,
                RunState::Finalizing,
                RunState::Done
            ]
        );
    }

    #[test]
    fn states_after_terminal_is_empty() {
        assert!(states_after(RunState::Done).is_empty());
        assert!(states_after(RunState::Cancelled).is_empty());
        assert!(states_after(RunState::Aborted).is_empty());
    }

    #[test]
    fn states_after_named_rejects_unknown() {
        assert_eq!(
            states_after_named("Exploding"),
            Err(LifecycleError::UnknownState("Exploding".to_string()))
        );
        assert_eq!(states_after_named("finalizing").unwrap(), &[RunState::Done]);
    }

    #[test]
    fn names_round_trip_through_display() {
        for state in ALL {
            assert_eq!(state.to_string().parse::<RunState>(), Ok(state));
        }
    }

    #[test]
    fn terminal_set() {
        let terminal: Vec<_> = ALL.into_iter().filter(|s| is_terminal(*s)).collect();
        assert_eq!(
            terminal,
            vec![RunState::Done, RunState::Cancelled, RunState::Aborted]
        );
    }

    #[test]
    fn next_follows_canonical_order() {
        assert_eq!(RunState::Initializing.next(), Some(RunState::Provisioning));
        assert_eq!(RunState::Finalizing.next(), Some(RunState::Done));
        assert_eq!(RunState::Done.next(), None);
        assert_eq!(RunState::Aborted.next(), None);
    }
}
