use swap_core::SwapId;

/// Secret vault errors.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("no secret stored for swap {0}")]
    NotFound(SwapId),

    #[error("a secret was already generated for swap {0}")]
    AlreadyGenerated(SwapId),

    #[error("secret does not match the commitment of swap {0}")]
    CommitmentMismatch(SwapId),

    #[error("invalid hex encoding: {0}")]
    InvalidEncoding(String),
}
