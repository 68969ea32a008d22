use crate::state_machine::{LifecycleEvent, SwapState};

/// Core protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid swap state transition from {from} on {event:?}")]
    InvalidStateTransition {
        from: SwapState,
        event: LifecycleEvent,
    },

    #[error("invalid timeouts: {0}")]
    InvalidTimeouts(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid party: {0}")]
    InvalidParty(String),
}
