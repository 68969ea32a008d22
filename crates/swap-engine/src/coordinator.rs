use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swap_core::{
    Clock, CoordinatorConfig, Role, SwapId, SwapParty, SwapState, SwapTimeouts, Timestamp,
};
use swap_crypto::SecretVault;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::machine::{Directive, EngineContext, RoutedEvent, SwapInput, SwapStateMachine};
use crate::registry::LedgerRegistry;
use crate::store::SwapStore;
use crate::swap::{Swap, SwapStatus};

/// The coordinator's non-owning view of a running swap.
struct SwapHandle {
    inputs: mpsc::Sender<SwapInput>,
    status: watch::Receiver<SwapStatus>,
    task: JoinHandle<()>,
}

/// Outcome of one [`SwapCoordinator::sweep`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Swaps that were asked to re-evaluate their deadlines.
    pub ticked: usize,
    /// Settled swaps dropped after their grace period.
    pub evicted: usize,
    /// Settled records deleted from the store after the retention period.
    pub purged: usize,
}

/// Owns the set of live swaps.
///
/// Each swap runs as its own task fed by a bounded queue, so inputs for one
/// swap are applied strictly in order while different swaps proceed in
/// parallel. The swap map is only written here: on creation, recovery and
/// eviction.
pub struct SwapCoordinator {
    ctx: EngineContext,
    swaps: DashMap<SwapId, SwapHandle>,
    events_tx: mpsc::Sender<RoutedEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<RoutedEvent>>>,
}

impl SwapCoordinator {
    pub fn new(
        ledgers: LedgerRegistry,
        store: Arc<dyn SwapStore>,
        clock: Arc<dyn Clock>,
        config: CoordinatorConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        Self {
            ctx: EngineContext {
                vault: Arc::new(SecretVault::new()),
                ledgers: Arc::new(ledgers),
                store,
                clock,
                config,
            },
            swaps: DashMap::new(),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    pub fn vault(&self) -> &SecretVault {
        &self.ctx.vault
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.ctx.config
    }

    /// Number of swaps currently held in memory.
    pub fn active_count(&self) -> usize {
        self.swaps.len()
    }

    /// Create a swap with a fresh id and start funding the initiator leg.
    pub async fn create_swap(
        &self,
        initiator: SwapParty,
        responder: SwapParty,
        timeouts: SwapTimeouts,
    ) -> Result<SwapId, EngineError> {
        self.create_swap_with_id(SwapId::new(), initiator, responder, timeouts)
            .await
    }

    /// Create a swap under a caller-chosen id.
    ///
    /// Fails with `DuplicateSwap` if the id is live or already on record.
    pub async fn create_swap_with_id(
        &self,
        id: SwapId,
        initiator: SwapParty,
        responder: SwapParty,
        timeouts: SwapTimeouts,
    ) -> Result<SwapId, EngineError> {
        let invalid = |e: swap_core::CoreError| EngineError::InvalidRequest(e.to_string());
        initiator.validate(Role::Initiator).map_err(invalid)?;
        responder.validate(Role::Responder).map_err(invalid)?;
        timeouts
            .validate(self.ctx.config.min_safety_margin())
            .map_err(invalid)?;
        if initiator.ledger_id == responder.ledger_id {
            return Err(EngineError::InvalidRequest(
                "both legs must live on different ledgers".into(),
            ));
        }
        for ledger_id in [&initiator.ledger_id, &responder.ledger_id] {
            if !self.ctx.ledgers.contains(ledger_id) {
                return Err(EngineError::UnknownLedger(ledger_id.clone()));
            }
        }
        if self.ctx.store.load(&id)?.is_some() {
            return Err(EngineError::DuplicateSwap(id));
        }

        let inputs = match self.swaps.entry(id) {
            Entry::Occupied(_) => return Err(EngineError::DuplicateSwap(id)),
            Entry::Vacant(slot) => {
                let (secret, commitment) = self.ctx.vault.generate(id)?;
                let swap = Swap::new(id, initiator, responder, timeouts, secret, self.ctx.clock.now());
                if let Err(e) = self.ctx.store.save(&swap) {
                    self.ctx.vault.discard(id);
                    return Err(e.into());
                }
                info!(swap_id = %id, commitment = %commitment, "swap created");

                let handle = self.spawn(SwapStateMachine::new(swap, self.ctx.clone()), Vec::new());
                let inputs = handle.inputs.clone();
                slot.insert(handle);
                inputs
            }
        };

        inputs
            .send(SwapInput::Start)
            .await
            .map_err(|_| EngineError::Stopped(id))?;
        Ok(id)
    }

    fn spawn(&self, machine: SwapStateMachine, initial: Vec<Directive>) -> SwapHandle {
        let (inputs, queue) = mpsc::channel(self.ctx.config.input_channel_capacity.max(1));
        let (status_tx, status) = watch::channel(machine.status());
        let task = tokio::spawn(machine.run(queue, initial, self.events_tx.clone(), status_tx));
        SwapHandle {
            inputs,
            status,
            task,
        }
    }

    /// Current snapshot of a swap: state, deadlines and contract references.
    ///
    /// Evicted swaps are answered from the store.
    pub fn get_swap_status(&self, id: &SwapId) -> Result<SwapStatus, EngineError> {
        if let Some(handle) = self.swaps.get(id) {
            return Ok(handle.status.borrow().clone());
        }
        match self.ctx.store.load(id)? {
            Some(swap) => Ok(swap.status()),
            None => Err(EngineError::NotFound(*id)),
        }
    }

    /// Snapshots of every swap held in memory, oldest first.
    pub fn list_swaps(&self) -> Vec<SwapStatus> {
        let mut all: Vec<SwapStatus> = self
            .swaps
            .iter()
            .map(|entry| entry.status.borrow().clone())
            .collect();
        all.sort_by_key(|s| s.swap_id);
        all
    }

    /// Subscribe to a live swap's status updates.
    pub fn subscribe(&self, id: &SwapId) -> Result<watch::Receiver<SwapStatus>, EngineError> {
        self.swaps
            .get(id)
            .map(|handle| handle.status.clone())
            .ok_or(EngineError::NotFound(*id))
    }

    /// Wait until a live swap's status satisfies `predicate`.
    pub async fn wait_until<P>(&self, id: &SwapId, predicate: P) -> Result<SwapStatus, EngineError>
    where
        P: FnMut(&SwapStatus) -> bool,
    {
        let mut status = self.subscribe(id)?;
        let snapshot = status
            .wait_for(predicate)
            .await
            .map_err(|_| EngineError::Stopped(*id))?;
        Ok(snapshot.clone())
    }

    /// Cancel a swap. Only possible before any leg is confirmed on-chain.
    pub async fn cancel_swap(&self, id: &SwapId) -> Result<(), EngineError> {
        let inputs = self.swaps.get(id).map(|handle| handle.inputs.clone());
        let Some(inputs) = inputs else {
            return match self.ctx.store.load(id)? {
                Some(swap) => Err(EngineError::AlreadySettled {
                    id: *id,
                    state: swap.state,
                }),
                None => Err(EngineError::NotFound(*id)),
            };
        };

        let (reply, outcome) = oneshot::channel();
        inputs
            .send(SwapInput::Cancel { reply })
            .await
            .map_err(|_| EngineError::Stopped(*id))?;
        outcome.await.map_err(|_| EngineError::Stopped(*id))?
    }

    /// Hand a watcher event to its swap. Events for unknown or evicted swaps
    /// are dropped.
    pub async fn route(&self, event: RoutedEvent) -> bool {
        let inputs = self
            .swaps
            .get(&event.swap_id)
            .map(|handle| handle.inputs.clone());
        match inputs {
            Some(inputs) => inputs
                .send(SwapInput::Ledger {
                    leg: event.leg,
                    event: event.event,
                })
                .await
                .is_ok(),
            None => {
                debug!(swap_id = %event.swap_id, leg = %event.leg, "late event for unknown swap dropped");
                false
            }
        }
    }

    /// Enforce the global timeout policy.
    ///
    /// Every live swap re-evaluates its deadlines; swaps settled for longer
    /// than the grace period are dropped from memory.
    pub async fn sweep(&self) -> SweepReport {
        let now = self.ctx.clock.now();
        let grace = self.ctx.config.terminal_grace();
        let live: Vec<_> = self
            .swaps
            .iter()
            .map(|entry| (*entry.key(), entry.inputs.clone(), entry.status.borrow().settled_at))
            .collect();

        let mut report = SweepReport::default();
        for (id, inputs, settled_at) in live {
            if let Some(at) = settled_at {
                if now.saturating_duration_since(at) >= grace {
                    self.evict(&id);
                    report.evicted += 1;
                    continue;
                }
            }
            if inputs.send(SwapInput::Tick).await.is_ok() {
                report.ticked += 1;
            } else {
                warn!(swap_id = %id, "swap task is gone");
            }
        }
        if let Some(retention) = self.ctx.config.record_retention() {
            report.purged = self.purge_records(now, retention);
        }
        report
    }

    /// Delete stored records that settled at least `retention` ago.
    /// Records of swaps still in the map are kept.
    fn purge_records(&self, now: Timestamp, retention: Duration) -> usize {
        let records = match self.ctx.store.load_all() {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "could not list stored swaps for purging");
                return 0;
            }
        };
        let mut purged = 0;
        for swap in records {
            let Some(at) = swap.settled_at else {
                continue;
            };
            if !swap.is_settled()
                || self.swaps.contains_key(&swap.id)
                || now.saturating_duration_since(at) < retention
            {
                continue;
            }
            match self.ctx.store.delete(&swap.id) {
                Ok(()) => {
                    debug!(swap_id = %swap.id, state = %swap.state, "swap record purged");
                    purged += 1;
                }
                Err(e) => warn!(swap_id = %swap.id, error = %e, "swap record purge failed"),
            }
        }
        purged
    }

    fn evict(&self, id: &SwapId) {
        if let Some((_, handle)) = self.swaps.remove(id) {
            let state = handle.status.borrow().state;
            // Dropping the only input sender ends the swap task.
            drop(handle);
            self.ctx.vault.discard(*id);
            info!(swap_id = %id, state = %state, "swap evicted");
        }
    }

    /// Reload unsettled swaps from the store and resume them.
    ///
    /// Returns the number of swaps resumed.
    pub async fn recover(&self) -> Result<usize, EngineError> {
        let mut resumed = 0;
        for swap in self.ctx.store.load_all()? {
            if swap.is_settled() || self.swaps.contains_key(&swap.id) {
                continue;
            }
            if let Some(secret) = swap.stored_secret.clone() {
                self.ctx.vault.restore(swap.id, secret, &swap.commitment)?;
            }

            let id = swap.id;
            let state = swap.state;
            let (machine, directives) = SwapStateMachine::resume(swap, self.ctx.clone());
            let handle = self.spawn(machine, directives);
            let inputs = handle.inputs.clone();
            self.swaps.insert(id, handle);

            let input = if state == SwapState::Created {
                SwapInput::Start
            } else {
                SwapInput::Tick
            };
            if inputs.send(input).await.is_err() {
                warn!(swap_id = %id, "resumed swap task is gone");
            }
            info!(swap_id = %id, state = %state, "swap resumed");
            resumed += 1;
        }
        Ok(resumed)
    }

    /// Route watcher events and sweep periodically until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), EngineError>
    where
        F: Future<Output = ()>,
    {
        let mut events = self
            .events_rx
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or(EngineError::AlreadyRunning)?;

        let mut sweep = tokio::time::interval(self.ctx.config.sweep_interval());
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            sweep_interval_ms = self.ctx.config.sweep_interval_ms,
            ledgers = self.ctx.ledgers.ledger_ids().len(),
            "swap coordinator running"
        );
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("swap coordinator stopping");
                    break;
                }
                Some(event) = events.recv() => {
                    self.route(event).await;
                }
                _ = sweep.tick() => {
                    let report = self.sweep().await;
                    debug!(
                        ticked = report.ticked,
                        evicted = report.evicted,
                        purged = report.purged,
                        "sweep done"
                    );
                }
            }
        }

        if let Ok(mut slot) = self.events_rx.lock() {
            *slot = Some(events);
        }
        Ok(())
    }

    /// Stop every swap task. Records stay in the store for [`Self::recover`].
    pub fn shutdown(&self) {
        for entry in self.swaps.iter() {
            entry.task.abort();
        }
        self.swaps.clear();
        info!("swap coordinator shut down");
    }
}
