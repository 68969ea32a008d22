use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use swap_core::{LedgerId, RetrySettings};
use swap_crypto::Secret;
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::error::LedgerError;
use crate::traits::{EventStream, LedgerAdapter};
use crate::types::{ContractRef, ContractSpec, EventCursor, EventPage, Receipt};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub timeout: Duration,
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetrySettings::default().into()
    }
}

impl From<RetrySettings> for RetryConfig {
    fn from(s: RetrySettings) -> Self {
        Self {
            timeout: Duration::from_millis(s.timeout_ms),
            max_retries: s.max_retries,
            base_delay: Duration::from_millis(s.base_delay_ms),
            max_delay: Duration::from_millis(s.max_delay_ms),
            jitter_ms: s.jitter_ms,
        }
    }
}

impl RetryConfig {
    /// No retries, no delays. Used where a test wants failures surfaced immediately.
    pub fn none() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (0-based): exponential, capped, jittered.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        let capped = std::cmp::min(backoff, self.max_delay);
        let jitter = if self.jitter_ms == 0 {
            Duration::from_millis(0)
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=self.jitter_ms))
        };
        capped + jitter
    }
}

/// Run `action`, retrying transient ledger failures and timeouts with backoff.
///
/// Definitive errors are returned immediately.
pub async fn retry_transient<T, F, Fut>(
    label: &'static str,
    config: &RetryConfig,
    mut action: F,
) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, LedgerError>>,
{
    let attempts = config.max_retries.saturating_add(1);
    for attempt in 0..attempts {
        let outcome = timeout(config.timeout, action()).await;
        let err = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) if !err.is_transient() => return Err(err),
            Ok(Err(err)) => err,
            Err(_) => LedgerError::ChainUnavailable(format!("{label} timed out")),
        };
        if attempt + 1 >= attempts {
            return Err(err);
        }
        warn!(attempt = attempt + 1, error = %err, "ledger call {label} failed; retrying");
        sleep(config.backoff(attempt as u32)).await;
    }

    Err(LedgerError::ChainUnavailable(format!(
        "retry exhausted for {label}"
    )))
}

/// Adapter decorator that applies [`retry_transient`] to every ledger call.
#[derive(Clone)]
pub struct RetryingLedger {
    inner: Arc<dyn LedgerAdapter>,
    config: RetryConfig,
}

impl RetryingLedger {
    pub fn new(inner: Arc<dyn LedgerAdapter>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl LedgerAdapter for RetryingLedger {
    async fn fund(&self, spec: &ContractSpec) -> Result<ContractRef, LedgerError> {
        retry_transient("fund", &self.config, || self.inner.fund(spec)).await
    }

    async fn redeem(
        &self,
        contract: &ContractRef,
        secret: &Secret,
    ) -> Result<Receipt, LedgerError> {
        retry_transient("redeem", &self.config, || self.inner.redeem(contract, secret)).await
    }

    async fn refund(&self, contract: &ContractRef) -> Result<Receipt, LedgerError> {
        retry_transient("refund", &self.config, || self.inner.refund(contract)).await
    }

    async fn find_contract(&self, spec: &ContractSpec) -> Result<Option<ContractRef>, LedgerError> {
        retry_transient("find_contract", &self.config, || self.inner.find_contract(spec)).await
    }

    async fn events_since(
        &self,
        contract: &ContractRef,
        from: EventCursor,
    ) -> Result<EventPage, LedgerError> {
        retry_transient("events_since", &self.config, || {
            self.inner.events_since(contract, from)
        })
        .await
    }

    fn watch(&self, contract: &ContractRef, from: EventCursor) -> EventStream {
        self.inner.watch(contract, from)
    }

    fn ledger_id(&self) -> &LedgerId {
        self.inner.ledger_id()
    }
}
