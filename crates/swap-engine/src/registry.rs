use std::collections::HashMap;
use std::sync::Arc;
use swap_core::LedgerId;
use swap_ledger::{LedgerAdapter, WatcherConfig};

use crate::error::EngineError;

struct Registered {
    adapter: Arc<dyn LedgerAdapter>,
    watcher: WatcherConfig,
}

/// Ledger adapters the engine can drive, keyed by ledger id.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Default)]
pub struct LedgerRegistry {
    ledgers: HashMap<LedgerId, Registered>,
}

impl LedgerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own `ledger_id()`, with the finality
    /// rule its watchers apply.
    pub fn register(&mut self, adapter: Arc<dyn LedgerAdapter>, watcher: WatcherConfig) {
        let id = adapter.ledger_id().clone();
        tracing::info!(
            ledger = %id,
            confirmations = watcher.confirmations_required,
            "Registering ledger adapter"
        );
        self.ledgers.insert(id, Registered { adapter, watcher });
    }

    pub fn adapter(&self, ledger_id: &LedgerId) -> Result<Arc<dyn LedgerAdapter>, EngineError> {
        self.ledgers
            .get(ledger_id)
            .map(|r| r.adapter.clone())
            .ok_or_else(|| EngineError::UnknownLedger(ledger_id.clone()))
    }

    pub fn watcher_config(&self, ledger_id: &LedgerId) -> Result<WatcherConfig, EngineError> {
        self.ledgers
            .get(ledger_id)
            .map(|r| r.watcher.clone())
            .ok_or_else(|| EngineError::UnknownLedger(ledger_id.clone()))
    }

    pub fn contains(&self, ledger_id: &LedgerId) -> bool {
        self.ledgers.contains_key(ledger_id)
    }

    pub fn ledger_ids(&self) -> Vec<LedgerId> {
        self.ledgers.keys().cloned().collect()
    }
}
