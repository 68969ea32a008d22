//! Policy knobs shared by the engine, the watchers and the node binary.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Global policy enforced by the swap coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// How often the coordinator sweeps live swaps for passed deadlines (ms).
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// How long a settled swap stays addressable for late duplicate events (ms).
    #[serde(default = "default_terminal_grace_ms")]
    pub terminal_grace_ms: u64,
    /// Minimum gap between the responder's and the initiator's deadline (ms).
    #[serde(default = "default_min_safety_margin_ms")]
    pub min_safety_margin_ms: u64,
    /// Refund funded legs automatically once their deadline passes.
    #[serde(default = "default_true")]
    pub auto_refund: bool,
    /// Reveal submissions on the responder leg before the initiator gives up
    /// and waits for refunds. The responder's claim on the initiator leg is
    /// never capped: it is retried until the initiator's deadline.
    #[serde(default = "default_max_redeem_attempts")]
    pub max_redeem_attempts: u32,
    /// How long a redeem or refund may go unconfirmed before it is submitted
    /// again (ms).
    #[serde(default = "default_resubmit_after_ms")]
    pub resubmit_after_ms: u64,
    /// Delete settled swap records from the store this long after settlement
    /// (ms). Unset keeps them forever.
    #[serde(default)]
    pub record_retention_ms: Option<u64>,
    /// Capacity of the watcher → coordinator event channel.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
    /// Capacity of each swap's input queue.
    #[serde(default = "default_input_channel_capacity")]
    pub input_channel_capacity: usize,
}

impl CoordinatorConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn terminal_grace(&self) -> Duration {
        Duration::from_millis(self.terminal_grace_ms)
    }

    pub fn min_safety_margin(&self) -> Duration {
        Duration::from_millis(self.min_safety_margin_ms)
    }

    pub fn resubmit_after(&self) -> Duration {
        Duration::from_millis(self.resubmit_after_ms)
    }

    pub fn record_retention(&self) -> Option<Duration> {
        self.record_retention_ms.map(Duration::from_millis)
    }
}

/// How a ledger's events are watched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherSettings {
    /// Delay between two polls of the ledger (ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Blocks (including the funding block) before `Funded` is final.
    #[serde(default = "default_confirmations")]
    pub confirmations_required: u64,
}

impl WatcherSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Retry policy for transient ledger failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_retry_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

// Default value functions
fn default_sweep_interval_ms() -> u64 {
    1_000
}
fn default_terminal_grace_ms() -> u64 {
    60_000
}
fn default_min_safety_margin_ms() -> u64 {
    30_000
}
fn default_true() -> bool {
    true
}
fn default_max_redeem_attempts() -> u32 {
    3
}
fn default_resubmit_after_ms() -> u64 {
    5_000
}
fn default_event_channel_capacity() -> usize {
    256
}
fn default_input_channel_capacity() -> usize {
    64
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_confirmations() -> u64 {
    1
}
fn default_retry_timeout_ms() -> u64 {
    6_000
}
fn default_max_retries() -> usize {
    3
}
fn default_base_delay_ms() -> u64 {
    250
}
fn default_max_delay_ms() -> u64 {
    5_000
}
fn default_jitter_ms() -> u64 {
    250
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: default_sweep_interval_ms(),
            terminal_grace_ms: default_terminal_grace_ms(),
            min_safety_margin_ms: default_min_safety_margin_ms(),
            auto_refund: true,
            max_redeem_attempts: default_max_redeem_attempts(),
            resubmit_after_ms: default_resubmit_after_ms(),
            record_retention_ms: None,
            event_channel_capacity: default_event_channel_capacity(),
            input_channel_capacity: default_input_channel_capacity(),
        }
    }
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            confirmations_required: default_confirmations(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_retry_timeout_ms(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}
