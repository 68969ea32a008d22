//! Shared fixtures for the cross-crate scenario tests.
//!
//! [`World`] runs a real [`SwapCoordinator`] over two simulated ledgers with
//! a manual clock. [`Driver`] steps a single [`SwapStateMachine`] by hand so
//! a test decides exactly when each ledger event is seen.

use std::sync::Arc;
use std::time::Duration;

use swap_core::{
    Amount, Clock, CoordinatorConfig, Leg, ManualClock, Role, SwapId, SwapParty, SwapState,
    SwapTimeouts, Timestamp,
};
use swap_crypto::SecretVault;
use swap_engine::{
    Directive, EngineContext, EngineError, LedgerRegistry, MemoryStore, SwapCoordinator,
    SwapInput, SwapStateMachine, SwapStatus, SwapStore, Swap,
};
use swap_ledger::{ContractWatcher, EventCursor, SimulatedLedger, WatcherConfig};
use tokio::task::JoinHandle;

pub const LEDGER_A: &str = "chain-a";
pub const LEDGER_B: &str = "chain-b";
pub const OPENING_BALANCE: u128 = 1_000;
pub const AMOUNT_INITIATOR: u128 = 100;
pub const AMOUNT_RESPONDER: u128 = 50;
pub const T_LONG_MS: u64 = 100;
pub const T_SHORT_MS: u64 = 40;
pub const MARGIN_MS: u64 = 30;

/// Policy used by every scenario: millisecond-scale deadlines and a fast sweep.
pub fn policy() -> CoordinatorConfig {
    CoordinatorConfig {
        sweep_interval_ms: 5,
        terminal_grace_ms: 1_000_000,
        min_safety_margin_ms: MARGIN_MS,
        ..CoordinatorConfig::default()
    }
}

/// Alice funds on chain-a and is paid on chain-b; Bob the reverse.
pub fn parties() -> (SwapParty, SwapParty) {
    (
        SwapParty::new(
            Role::Initiator,
            LEDGER_A,
            "alice-a",
            "alice-b",
            Amount::new(AMOUNT_INITIATOR),
        ),
        SwapParty::new(
            Role::Responder,
            LEDGER_B,
            "bob-b",
            "bob-a",
            Amount::new(AMOUNT_RESPONDER),
        ),
    )
}

pub fn timeouts() -> SwapTimeouts {
    SwapTimeouts::new(
        Duration::from_millis(T_LONG_MS),
        Duration::from_millis(T_SHORT_MS),
    )
}

fn ledgers(clock: &Arc<ManualClock>) -> (SimulatedLedger, SimulatedLedger) {
    let a = SimulatedLedger::new(LEDGER_A, clock.clone());
    let b = SimulatedLedger::new(LEDGER_B, clock.clone());
    a.deposit("alice-a", OPENING_BALANCE);
    b.deposit("bob-b", OPENING_BALANCE);
    (a, b)
}

fn registry(a: &SimulatedLedger, b: &SimulatedLedger, confirmations_a: u64) -> LedgerRegistry {
    let mut registry = LedgerRegistry::new();
    registry.register(
        Arc::new(a.clone()),
        WatcherConfig {
            confirmations_required: confirmations_a,
        },
    );
    registry.register(Arc::new(b.clone()), WatcherConfig::default());
    registry
}

/// Balances of the four accounts involved in a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balances {
    pub alice_a: u128,
    pub bob_a: u128,
    pub alice_b: u128,
    pub bob_b: u128,
}

impl Balances {
    pub fn read(a: &SimulatedLedger, b: &SimulatedLedger) -> Self {
        Self {
            alice_a: a.balance("alice-a"),
            bob_a: a.balance("bob-a"),
            alice_b: b.balance("alice-b"),
            bob_b: b.balance("bob-b"),
        }
    }

    /// Both parties got the counterparty's funds.
    pub fn swapped() -> Self {
        Self {
            alice_a: OPENING_BALANCE - AMOUNT_INITIATOR,
            bob_a: AMOUNT_INITIATOR,
            alice_b: AMOUNT_RESPONDER,
            bob_b: OPENING_BALANCE - AMOUNT_RESPONDER,
        }
    }

    /// Everyone holds exactly what they started with.
    pub fn untouched() -> Self {
        Self {
            alice_a: OPENING_BALANCE,
            bob_a: 0,
            alice_b: 0,
            bob_b: OPENING_BALANCE,
        }
    }
}

/// A coordinator running its event loop over two simulated ledgers.
pub struct World {
    pub clock: Arc<ManualClock>,
    pub a: SimulatedLedger,
    pub b: SimulatedLedger,
    pub store: Arc<MemoryStore>,
    pub coordinator: Arc<SwapCoordinator>,
    runner: JoinHandle<Result<(), EngineError>>,
}

impl World {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self::with_confirmations(config, 1)
    }

    pub fn with_confirmations(config: CoordinatorConfig, confirmations_a: u64) -> Self {
        let clock = Arc::new(ManualClock::new());
        let (a, b) = ledgers(&clock);
        Self::build(config, clock, a, b, Arc::new(MemoryStore::new()), confirmations_a)
    }

    fn build(
        config: CoordinatorConfig,
        clock: Arc<ManualClock>,
        a: SimulatedLedger,
        b: SimulatedLedger,
        store: Arc<MemoryStore>,
        confirmations_a: u64,
    ) -> Self {
        let coordinator = Arc::new(SwapCoordinator::new(
            registry(&a, &b, confirmations_a),
            store.clone(),
            clock.clone(),
            config,
        ));
        let runner = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.run(std::future::pending()).await })
        };
        Self {
            clock,
            a,
            b,
            store,
            coordinator,
            runner,
        }
    }

    /// Stop this coordinator and start a fresh one over the same ledgers,
    /// store and clock, as a process restart would. Returns the new world
    /// and the number of swaps it resumed.
    pub async fn restart(self, config: CoordinatorConfig) -> (Self, usize) {
        self.restart_edited(config, |_| {}).await
    }

    /// Like [`World::restart`], but `edit` may rewrite the store while no
    /// coordinator is running, to stand in for a crash at an awkward moment.
    pub async fn restart_edited<F>(self, config: CoordinatorConfig, edit: F) -> (Self, usize)
    where
        F: FnOnce(&MemoryStore),
    {
        let World {
            clock,
            a,
            b,
            store,
            coordinator,
            runner,
        } = self;
        coordinator.shutdown();
        runner.abort();
        // Let the aborted swap tasks unwind before the store is touched.
        tokio::time::sleep(Duration::from_millis(10)).await;
        edit(&store);

        let world = Self::build(config, clock, a, b, store, 1);
        let resumed = world.coordinator.recover().await.expect("recovery");
        (world, resumed)
    }

    pub async fn create(&self) -> SwapId {
        let (initiator, responder) = parties();
        self.coordinator
            .create_swap(initiator, responder, timeouts())
            .await
            .expect("swap creation")
    }

    pub async fn wait_for<P>(&self, id: &SwapId, predicate: P) -> SwapStatus
    where
        P: FnMut(&SwapStatus) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), self.coordinator.wait_until(id, predicate))
            .await
            .expect("timed out waiting for swap status")
            .expect("swap is live")
    }

    pub async fn wait_state(&self, id: &SwapId, state: SwapState) -> SwapStatus {
        self.wait_for(id, |s| s.state == state).await
    }

    pub async fn wait_settled(&self, id: &SwapId) -> SwapStatus {
        self.wait_for(id, |s| s.settled_at.is_some()).await
    }

    /// Move time to `ms` and make every swap re-evaluate its deadlines.
    pub async fn advance_to(&self, ms: u64) {
        self.clock.set(Timestamp(ms));
        self.coordinator.sweep().await;
    }

    pub fn balances(&self) -> Balances {
        Balances::read(&self.a, &self.b)
    }

    pub fn stop(self) {
        self.coordinator.shutdown();
        self.runner.abort();
    }
}

/// Steps one swap's state machine by hand.
///
/// Nothing happens unless the test asks: the clock only moves on
/// [`Driver::set_time`] and each leg's events are only delivered on
/// [`Driver::observe`].
pub struct Driver {
    pub clock: Arc<ManualClock>,
    pub a: SimulatedLedger,
    pub b: SimulatedLedger,
    pub store: Arc<MemoryStore>,
    ctx: EngineContext,
    machine: SwapStateMachine,
    watchers: Vec<(Leg, ContractWatcher)>,
}

impl Driver {
    pub fn new(config: CoordinatorConfig) -> Self {
        let clock = Arc::new(ManualClock::new());
        let (a, b) = ledgers(&clock);
        let store = Arc::new(MemoryStore::new());
        let ctx = EngineContext {
            vault: Arc::new(SecretVault::new()),
            ledgers: Arc::new(registry(&a, &b, 1)),
            store: store.clone(),
            clock: clock.clone(),
            config,
        };

        let id = SwapId::new();
        let (secret, _) = ctx.vault.generate(id).expect("fresh swap id");
        let (initiator, responder) = parties();
        let swap = Swap::new(id, initiator, responder, timeouts(), secret, clock.now());
        let machine = SwapStateMachine::new(swap, ctx.clone());

        Self {
            clock,
            a,
            b,
            store,
            ctx,
            machine,
            watchers: Vec::new(),
        }
    }

    pub fn swap(&self) -> &Swap {
        self.machine.swap()
    }

    pub fn state(&self) -> SwapState {
        self.machine.swap().state
    }

    pub fn balances(&self) -> Balances {
        Balances::read(&self.a, &self.b)
    }

    pub fn set_time(&self, ms: u64) {
        self.clock.set(Timestamp(ms));
    }

    pub async fn send(&mut self, input: SwapInput) {
        let directives = self.machine.handle(input).await;
        for directive in directives {
            let Directive::Watch { leg, contract, from } = directive;
            let config = self
                .ctx
                .ledgers
                .watcher_config(&contract.ledger_id)
                .expect("registered ledger");
            self.watchers.retain(|(l, _)| *l != leg);
            self.watchers
                .push((leg, ContractWatcher::new(contract, from, config)));
        }
    }

    /// Deliver whatever `leg`'s watcher finds in one poll.
    pub async fn observe(&mut self, leg: Leg) -> usize {
        let mut observed = Vec::new();
        for (l, watcher) in self.watchers.iter_mut().filter(|(l, _)| *l == leg) {
            let adapter = self
                .ctx
                .ledgers
                .adapter(&watcher.contract().ledger_id)
                .expect("registered ledger");
            let events = watcher
                .poll_once(adapter.as_ref())
                .await
                .expect("simulated ledger poll");
            observed.extend(events.into_iter().map(|event| (*l, event)));
        }
        let count = observed.len();
        for (leg, event) in observed {
            self.send(SwapInput::Ledger { leg, event }).await;
        }
        count
    }

    /// Tick and deliver events on both legs until nothing new happens.
    pub async fn settle_at(&mut self, ms: u64) {
        self.set_time(ms);
        for _ in 0..16 {
            self.send(SwapInput::Tick).await;
            let mut delivered = 0;
            for leg in Leg::BOTH {
                delivered += self.observe(leg).await;
            }
            if delivered == 0 {
                break;
            }
        }
    }

    /// Step time from now to `end_ms` in `step_ms` increments, settling at
    /// each step the way a periodic sweep would.
    pub async fn run_until(&mut self, end_ms: u64, step_ms: u64) {
        let mut t = self.clock.now().0;
        while t < end_ms {
            self.settle_at(t).await;
            t += step_ms;
        }
        self.settle_at(end_ms).await;
    }

    /// Restart every watcher from the beginning of its contract's log, as if
    /// the persisted cursors had been lost.
    pub fn rewind_watchers(&mut self) {
        let config = WatcherConfig::default();
        for (_, watcher) in self.watchers.iter_mut() {
            *watcher = ContractWatcher::new(
                watcher.contract().clone(),
                EventCursor::START,
                config.clone(),
            );
        }
    }

    /// The record as last persisted.
    pub fn persisted(&self) -> Option<Swap> {
        self.store
            .load(&self.machine.swap().id)
            .expect("memory store never fails")
    }
}
