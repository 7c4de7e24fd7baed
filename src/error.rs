//! Domain errors callers are expected to match on.
//!
//! Storage, settings and export I/O keep using `anyhow`; these enums cover the
//! command surface of the session controller and the completion pipeline.

use crate::session::RunState;

/// Rejected session commands. None of these disturb the running clock.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SessionError {
    #[error("a session is already active")]
    AlreadyActive,

    #[error("no active session")]
    NoActiveSession,

    #[error("session plan has no segments")]
    EmptyPlan,

    #[error("invalid session plan: {0}")]
    InvalidPlan(String),

    #[error("cannot {command} while {state:?}")]
    InvalidTransition {
        command: &'static str,
        state: RunState,
    },

    #[error("previous is only available for pose flows")]
    PreviousUnsupported,

    #[error("invalid volume {0}")]
    InvalidVolume(f64),

    #[error(transparent)]
    Completion(#[from] CompletionError),
}

/// Records the completion pipeline refuses to process.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("session {0} was cancelled and cannot be completed")]
    Cancelled(String),

    #[error("session {0} was already processed")]
    AlreadyProcessed(String),
}
