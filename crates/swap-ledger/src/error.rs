use crate::types::ContractRef;

/// Errors a ledger integration reports back to the swap core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: u128, required: u128 },

    #[error("ledger unavailable: {0}")]
    ChainUnavailable(String),

    #[error("rejected by ledger: {0}")]
    Rejected(String),

    #[error("secret does not open contract {0}")]
    InvalidSecret(ContractRef),

    #[error("contract already spent: {0}")]
    AlreadySpent(ContractRef),

    #[error("refund timeout not reached for contract {0}")]
    TimeoutNotReached(ContractRef),

    #[error("contract {0} expired, only a refund is possible")]
    Expired(ContractRef),

    #[error("unknown contract: {0}")]
    UnknownContract(ContractRef),
}

impl LedgerError {
    /// Transient errors are retried with backoff at the adapter/watcher boundary.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ChainUnavailable(_))
    }
}
