use swap_core::{CoreError, LedgerId, SwapId, SwapState};
use swap_crypto::VaultError;
use swap_ledger::LedgerError;
use thiserror::Error;

/// Errors from swap persistence backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Errors surfaced by the coordinator API.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("swap not found: {0}")]
    NotFound(SwapId),

    #[error("swap already exists: {0}")]
    DuplicateSwap(SwapId),

    #[error("swap {0} is already funded; only a timeout refund remains")]
    AlreadyFunded(SwapId),

    #[error("swap {id} already finished in state {state}")]
    AlreadySettled { id: SwapId, state: SwapState },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no adapter registered for ledger {0}")]
    UnknownLedger(LedgerId),

    #[error("coordinator event loop is already running")]
    AlreadyRunning,

    #[error("swap task for {0} has stopped")]
    Stopped(SwapId),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
