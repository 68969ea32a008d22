//! The atomicswaps node orchestrator.
//!
//! Ties together the configured ledgers, the swap store and the coordinator,
//! and keeps the monotonic clock checkpointed so that a restart never moves
//! deadlines backwards.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use swap_core::{Clock, MonotonicClock};
use swap_engine::{LedgerRegistry, MemoryStore, SwapCoordinator, SwapStore};
use swap_ledger::{LedgerAdapter, RetryConfig, RetryingLedger, SimulatedLedger, WatcherConfig};

use crate::config::{LedgerConfig, NodeConfig};
use crate::storage::Storage;

const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(5);

/// Build one simulated ledger per config entry, funded with its opening
/// balances, and register each behind a retrying adapter.
pub fn simulated_ledgers(
    ledgers: &[LedgerConfig],
    retry: RetryConfig,
    clock: Arc<dyn Clock>,
) -> (Vec<SimulatedLedger>, LedgerRegistry) {
    let mut registry = LedgerRegistry::new();
    let mut built = Vec::with_capacity(ledgers.len());
    for config in ledgers {
        let settings = config.watcher_settings();
        let ledger = SimulatedLedger::with_polling(
            config.ledger_id(),
            clock.clone(),
            settings.poll_interval(),
            retry.clone(),
        );
        for (address, amount) in &config.balances {
            ledger.deposit(address, u128::from(*amount));
        }
        let adapter = RetryingLedger::new(Arc::new(ledger.clone()), retry.clone());
        registry.register(Arc::new(adapter), WatcherConfig::from_settings(&settings));
        built.push(ledger);
    }
    (built, registry)
}

/// A running node: storage, ledgers and the swap coordinator.
pub struct SwapNode {
    clock: Arc<MonotonicClock>,
    /// None when persistence is disabled.
    storage: Option<Arc<Storage>>,
    ledgers: Vec<SimulatedLedger>,
    coordinator: Arc<SwapCoordinator>,
}

impl SwapNode {
    pub fn new(config: NodeConfig) -> Result<Self> {
        config.validate()?;

        let storage = if config.storage.persist {
            let storage = Storage::open(&config.storage.data_dir)?;
            tracing::info!(path = %config.storage.data_dir.display(), "storage initialized");
            Some(Arc::new(storage))
        } else {
            tracing::warn!("persistence disabled; swaps will not survive a restart");
            None
        };

        let checkpoint = match &storage {
            Some(storage) => storage.load_clock_checkpoint()?,
            None => None,
        };
        let clock = Arc::new(match &checkpoint {
            Some(checkpoint) => {
                tracing::info!(
                    checkpoint = %checkpoint.timestamp,
                    written_at = %checkpoint.written_at,
                    "resuming monotonic clock"
                );
                MonotonicClock::resume_from(checkpoint.timestamp)
            }
            None => MonotonicClock::new(),
        });

        let (ledgers, registry) = simulated_ledgers(
            &config.ledgers,
            RetryConfig::from(config.retry.clone()),
            clock.clone(),
        );

        let store: Arc<dyn SwapStore> = match &storage {
            Some(storage) => storage.clone(),
            None => Arc::new(MemoryStore::new()),
        };
        let coordinator = Arc::new(SwapCoordinator::new(
            registry,
            store,
            clock.clone(),
            config.coordinator.clone(),
        ));

        tracing::info!(ledgers = ledgers.len(), "atomicswaps node created");
        Ok(Self {
            clock,
            storage,
            ledgers,
            coordinator,
        })
    }

    pub fn coordinator(&self) -> &Arc<SwapCoordinator> {
        &self.coordinator
    }

    /// Resume every unsettled swap found in storage.
    pub async fn start(&self) -> Result<usize> {
        for ledger in &self.ledgers {
            tracing::info!(ledger = %ledger.ledger_id(), height = ledger.height(), "ledger ready");
        }
        let resumed = self.coordinator.recover().await?;
        tracing::info!(resumed, "recovered swaps from storage");
        self.checkpoint_clock();
        Ok(resumed)
    }

    /// Run the coordinator loop, checkpointing the clock periodically.
    ///
    /// Returns only if the coordinator stops on its own.
    pub async fn run(&self) -> Result<()> {
        let coordinator = self.coordinator.run(std::future::pending());
        tokio::pin!(coordinator);
        let mut checkpoint = tokio::time::interval(CHECKPOINT_INTERVAL);

        tracing::info!("entering main event loop");
        loop {
            tokio::select! {
                result = &mut coordinator => {
                    result?;
                    return Ok(());
                }
                _ = checkpoint.tick() => {
                    self.checkpoint_clock();
                    tracing::debug!(active = self.coordinator.active_count(), "node heartbeat");
                }
            }
        }
    }

    /// Stop every swap task and flush state to disk.
    pub async fn shutdown(&self) -> Result<()> {
        self.coordinator.shutdown();
        self.checkpoint_clock();
        if let Some(storage) = &self.storage {
            storage.flush()?;
        }
        Ok(())
    }

    fn checkpoint_clock(&self) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.save_clock_checkpoint(self.clock.now()) {
                tracing::error!(error = %e, "failed to checkpoint clock");
            }
        }
    }
}
