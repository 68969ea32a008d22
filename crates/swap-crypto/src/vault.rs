use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use swap_core::SwapId;

use crate::error::VaultError;
use crate::secret::{verify, Commitment, Secret};

/// Owner of every initiator secret held by this process.
///
/// Thread-safe: uses `DashMap` for concurrent access. A commitment issued once
/// is remembered until [`SecretVault::teardown`], so a secret is never handed
/// out for two swaps.
pub struct SecretVault {
    secrets: DashMap<SwapId, Secret>,
    used: DashSet<Commitment>,
}

impl SecretVault {
    /// Create a new, empty vault.
    pub fn new() -> Self {
        Self {
            secrets: DashMap::new(),
            used: DashSet::new(),
        }
    }

    /// Generate a fresh secret for `swap_id` and return it with its commitment.
    ///
    /// Only the initiator generates secrets. Fails if the swap already has one.
    pub fn generate(&self, swap_id: SwapId) -> Result<(Secret, Commitment), VaultError> {
        let entry = match self.secrets.entry(swap_id) {
            Entry::Occupied(_) => return Err(VaultError::AlreadyGenerated(swap_id)),
            Entry::Vacant(v) => v,
        };

        let (secret, commitment) = loop {
            let secret = Secret::generate();
            let commitment = secret.commitment();
            if self.used.insert(commitment) {
                break (secret, commitment);
            }
            tracing::warn!(swap_id = %swap_id, "secret collision, regenerating");
        };

        entry.insert(secret.clone());
        tracing::info!(swap_id = %swap_id, commitment = %commitment, "secret generated");
        Ok((secret, commitment))
    }

    /// Pure check that `secret` opens `commitment`.
    pub fn verify(secret: &Secret, commitment: &Commitment) -> bool {
        verify(secret, commitment)
    }

    /// Expose the stored secret of a swap once the initiator decided to redeem.
    pub fn reveal(&self, swap_id: SwapId) -> Result<Secret, VaultError> {
        let secret = self
            .secrets
            .get(&swap_id)
            .map(|entry| entry.value().clone())
            .ok_or(VaultError::NotFound(swap_id))?;
        tracing::info!(swap_id = %swap_id, "secret revealed");
        Ok(secret)
    }

    /// Put back a secret loaded from persistent storage.
    ///
    /// Restoring the same secret twice is a no-op; a different secret for the
    /// same swap is rejected.
    pub fn restore(
        &self,
        swap_id: SwapId,
        secret: Secret,
        commitment: &Commitment,
    ) -> Result<(), VaultError> {
        if !verify(&secret, commitment) {
            return Err(VaultError::CommitmentMismatch(swap_id));
        }
        match self.secrets.entry(swap_id) {
            Entry::Occupied(existing) => {
                if existing.get() != &secret {
                    return Err(VaultError::AlreadyGenerated(swap_id));
                }
            }
            Entry::Vacant(v) => {
                v.insert(secret);
            }
        }
        self.used.insert(*commitment);
        Ok(())
    }

    /// Drop the secret of a finished swap. Its commitment stays marked as used.
    pub fn discard(&self, swap_id: SwapId) {
        if self.secrets.remove(&swap_id).is_some() {
            tracing::debug!(swap_id = %swap_id, "secret discarded");
        }
    }

    /// Whether `commitment` was ever issued by this vault.
    pub fn is_used(&self, commitment: &Commitment) -> bool {
        self.used.contains(commitment)
    }

    /// Whether a secret is currently stored for `swap_id`.
    pub fn contains(&self, swap_id: &SwapId) -> bool {
        self.secrets.contains_key(swap_id)
    }

    /// Forget everything, including the used-commitment set.
    pub fn teardown(&self) {
        self.secrets.clear();
        self.used.clear();
        tracing::info!("secret vault torn down");
    }

    /// Get the number of stored secrets.
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Check if the vault holds no secrets.
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl Default for SecretVault {
    fn default() -> Self {
        Self::new()
    }
}
