//! Error taxonomy for the simulation engine.
//!
//! Every core operation returns [`EngineError`]. The variants are
//! deliberately coarse so the transport layer can map them onto distinct
//! user-visible outcomes without inspecting messages.

use crisou_types::{SessionId, TerminationReason};

/// Errors surfaced by the engine to its callers.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The caller supplied bad input. Nothing was changed.
    #[error("validation error: {0}")]
    Validation(String),

    /// The run has already ended; a terminated state is frozen.
    #[error("session already terminated ({reason})")]
    Terminated {
        /// Why the run ended.
        reason: TerminationReason,
    },

    /// The operation is not allowed in the session's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// No session exists under the given key.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The language model was unavailable, timed out, or returned nothing
    /// usable for a required field. State is unchanged; the call may be retried.
    #[error("generation failed: {0}")]
    GenerationFailure(String),

    /// The session store could not be read or written.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Simulation configuration is invalid.
    #[error("config error: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether the caller may retry the same request unchanged.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::GenerationFailure(_) | Self::Persistence(_))
    }

    /// Whether the error means "operation on an ended or missing run".
    pub const fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            Self::Terminated { .. } | Self::InvalidState(_) | Self::SessionNotFound(_)
        )
    }
}
