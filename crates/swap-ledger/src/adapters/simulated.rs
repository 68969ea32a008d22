use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use swap_core::{Clock, LedgerId};
use swap_crypto::Secret;

use crate::error::LedgerError;
use crate::retry::RetryConfig;
use crate::stream::poll_events;
use crate::traits::{EventStream, LedgerAdapter};
use crate::types::{
    ContractEvent, ContractRef, ContractSpec, EventCursor, EventPage, FundedContract,
    LedgerEvent, Receipt,
};

/// Lifecycle of a simulated HTLC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractStatus {
    Active,
    Redeemed,
    Refunded,
}

/// Number of calls each adapter operation has received, failed ones included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub fund: usize,
    pub redeem: usize,
    pub refund: usize,
    pub events: usize,
}

#[derive(Debug, Default)]
struct Counters {
    fund: AtomicUsize,
    redeem: AtomicUsize,
    refund: AtomicUsize,
    events: AtomicUsize,
}

#[derive(Debug, Clone)]
struct SimContract {
    spec: ContractSpec,
    status: ContractStatus,
    log: Vec<LedgerEvent>,
    expired_emitted: bool,
}

impl SimContract {
    fn append(&mut self, height: u64, event: ContractEvent) {
        let seq = self.log.len() as u64;
        self.log.push(LedgerEvent { seq, height, event });
    }
}

struct Inner {
    ledger_id: LedgerId,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    retry: RetryConfig,
    contracts: DashMap<String, SimContract>,
    /// Address -> spendable balance.
    balances: DashMap<String, u128>,
    height: AtomicU64,
    next_contract: AtomicU64,
    fail_next: AtomicU32,
    reject_funding: AtomicBool,
    counters: Counters,
}

/// In-memory HTLC ledger.
///
/// Every accepted transaction is mined into its own block, so a fresh event
/// has exactly one confirmation until [`SimulatedLedger::mine`] adds more.
/// Deadlines are judged against the shared [`Clock`], which lets tests move
/// time with a `ManualClock`. Cloning yields another handle to the same
/// ledger.
#[derive(Clone)]
pub struct SimulatedLedger {
    inner: Arc<Inner>,
}

impl SimulatedLedger {
    pub fn new(ledger_id: impl Into<LedgerId>, clock: Arc<dyn Clock>) -> Self {
        Self::with_polling(
            ledger_id,
            clock,
            Duration::from_millis(10),
            RetryConfig::none(),
        )
    }

    /// Create a ledger whose `watch` streams poll at `poll_interval` and back
    /// off on failure according to `retry`.
    pub fn with_polling(
        ledger_id: impl Into<LedgerId>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
        retry: RetryConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                ledger_id: ledger_id.into(),
                clock,
                poll_interval,
                retry,
                contracts: DashMap::new(),
                balances: DashMap::new(),
                height: AtomicU64::new(0),
                next_contract: AtomicU64::new(1),
                fail_next: AtomicU32::new(0),
                reject_funding: AtomicBool::new(false),
                counters: Counters::default(),
            }),
        }
    }

    /// Credit `amount` to `address`.
    pub fn deposit(&self, address: &str, amount: u128) {
        self.inner
            .balances
            .entry(address.to_string())
            .and_modify(|b| *b = b.saturating_add(amount))
            .or_insert(amount);
    }

    pub fn balance(&self, address: &str) -> u128 {
        self.inner.balances.get(address).map(|b| *b).unwrap_or(0)
    }

    pub fn height(&self) -> u64 {
        self.inner.height.load(Ordering::SeqCst)
    }

    /// Mine `blocks` empty blocks, adding confirmations to everything before.
    pub fn mine(&self, blocks: u64) -> u64 {
        self.inner.height.fetch_add(blocks, Ordering::SeqCst) + blocks
    }

    /// Make the next `n` submissions (fund, redeem or refund) fail with a
    /// transient `ChainUnavailable` error.
    pub fn fail_next(&self, n: u32) {
        self.inner.fail_next.store(n, Ordering::SeqCst);
    }

    /// Reject every funding attempt from now on.
    pub fn reject_funding(&self, reject: bool) {
        self.inner.reject_funding.store(reject, Ordering::SeqCst);
    }

    pub fn call_counts(&self) -> CallCounts {
        let c = &self.inner.counters;
        CallCounts {
            fund: c.fund.load(Ordering::SeqCst),
            redeem: c.redeem.load(Ordering::SeqCst),
            refund: c.refund.load(Ordering::SeqCst),
            events: c.events.load(Ordering::SeqCst),
        }
    }

    pub fn contract_status(&self, contract: &ContractRef) -> Option<ContractStatus> {
        self.inner
            .contracts
            .get(&contract.contract_id)
            .map(|c| c.status)
    }

    /// Terms a contract was funded with.
    pub fn contract_spec(&self, contract: &ContractRef) -> Option<ContractSpec> {
        self.inner
            .contracts
            .get(&contract.contract_id)
            .map(|c| c.spec.clone())
    }

    pub fn contract_count(&self) -> usize {
        self.inner.contracts.len()
    }

    fn mine_tx(&self) -> u64 {
        self.inner.height.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn take_injected_failure(&self, op: &str) -> Result<(), LedgerError> {
        let injected = self
            .inner
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            tracing::debug!(ledger = %self.inner.ledger_id, op, "injected ledger failure");
            return Err(LedgerError::ChainUnavailable(format!(
                "{} unavailable",
                self.inner.ledger_id
            )));
        }
        Ok(())
    }

    fn check_ledger(&self, contract: &ContractRef) -> Result<(), LedgerError> {
        if contract.ledger_id != self.inner.ledger_id {
            return Err(LedgerError::UnknownContract(contract.clone()));
        }
        Ok(())
    }

    fn credit(&self, address: &str, amount: u128) {
        self.deposit(address, amount);
    }

    fn receipt(&self, contract: &ContractRef, height: u64) -> Receipt {
        Receipt {
            contract: contract.clone(),
            tx_ref: format!("{}-tx-{}", self.inner.ledger_id, height),
            submitted_at: Utc::now(),
        }
    }
}

#[async_trait]
impl LedgerAdapter for SimulatedLedger {
    async fn fund(&self, spec: &ContractSpec) -> Result<ContractRef, LedgerError> {
        self.inner.counters.fund.fetch_add(1, Ordering::SeqCst);
        self.take_injected_failure("fund")?;

        if spec.ledger_id != self.inner.ledger_id {
            return Err(LedgerError::Rejected(format!(
                "contract for {} submitted to {}",
                spec.ledger_id, self.inner.ledger_id
            )));
        }
        if self.inner.reject_funding.load(Ordering::SeqCst) {
            return Err(LedgerError::Rejected("funding rejected by ledger".into()));
        }
        if spec.amount.is_zero() {
            return Err(LedgerError::Rejected("zero-value contract".into()));
        }
        let required = spec.amount.value();
        {
            let Some(mut balance) = self.inner.balances.get_mut(&spec.funder) else {
                return Err(LedgerError::InsufficientFunds {
                    available: 0,
                    required,
                });
            };
            if *balance < required {
                return Err(LedgerError::InsufficientFunds {
                    available: *balance,
                    required,
                });
            }
            *balance -= required;
        }

        let n = self.inner.next_contract.fetch_add(1, Ordering::SeqCst);
        let contract = ContractRef::new(
            self.inner.ledger_id.clone(),
            format!("{}-htlc-{}", self.inner.ledger_id, n),
        );
        let height = self.mine_tx();
        let mut record = SimContract {
            spec: spec.clone(),
            status: ContractStatus::Active,
            log: Vec::new(),
            expired_emitted: false,
        };
        record.append(height, ContractEvent::Funded(FundedContract::from(spec)));
        self.inner
            .contracts
            .insert(contract.contract_id.clone(), record);

        tracing::info!(
            contract = %contract,
            amount = %spec.amount,
            deadline = %spec.refund_deadline,
            height,
            "HTLC funded"
        );
        Ok(contract)
    }

    async fn redeem(
        &self,
        contract: &ContractRef,
        secret: &Secret,
    ) -> Result<Receipt, LedgerError> {
        self.inner.counters.redeem.fetch_add(1, Ordering::SeqCst);
        self.take_injected_failure("redeem")?;
        self.check_ledger(contract)?;

        let mut entry = self
            .inner
            .contracts
            .get_mut(&contract.contract_id)
            .ok_or_else(|| LedgerError::UnknownContract(contract.clone()))?;
        let record = entry.value_mut();

        if record.status != ContractStatus::Active {
            return Err(LedgerError::AlreadySpent(contract.clone()));
        }
        if self.inner.clock.now() >= record.spec.refund_deadline {
            return Err(LedgerError::Expired(contract.clone()));
        }
        if !swap_crypto::verify(secret, &record.spec.commitment) {
            return Err(LedgerError::InvalidSecret(contract.clone()));
        }

        let height = self.mine_tx();
        record.status = ContractStatus::Redeemed;
        record.append(
            height,
            ContractEvent::Redeemed {
                secret: secret.clone(),
            },
        );
        let (redeemer, amount) = (record.spec.redeemer.clone(), record.spec.amount.value());
        drop(entry);
        self.credit(&redeemer, amount);

        tracing::info!(contract = %contract, height, "HTLC redeemed");
        Ok(self.receipt(contract, height))
    }

    async fn refund(&self, contract: &ContractRef) -> Result<Receipt, LedgerError> {
        self.inner.counters.refund.fetch_add(1, Ordering::SeqCst);
        self.take_injected_failure("refund")?;
        self.check_ledger(contract)?;

        let mut entry = self
            .inner
            .contracts
            .get_mut(&contract.contract_id)
            .ok_or_else(|| LedgerError::UnknownContract(contract.clone()))?;
        let record = entry.value_mut();

        if record.status != ContractStatus::Active {
            return Err(LedgerError::AlreadySpent(contract.clone()));
        }
        if self.inner.clock.now() < record.spec.refund_deadline {
            return Err(LedgerError::TimeoutNotReached(contract.clone()));
        }

        let height = self.mine_tx();
        record.status = ContractStatus::Refunded;
        record.append(height, ContractEvent::Refunded);
        let (funder, amount) = (record.spec.funder.clone(), record.spec.amount.value());
        drop(entry);
        self.credit(&funder, amount);

        tracing::info!(contract = %contract, height, "HTLC refunded");
        Ok(self.receipt(contract, height))
    }

    async fn find_contract(&self, spec: &ContractSpec) -> Result<Option<ContractRef>, LedgerError> {
        let found = self
            .inner
            .contracts
            .iter()
            .find(|entry| entry.spec == *spec)
            .map(|entry| ContractRef::new(self.inner.ledger_id.clone(), entry.key().clone()));
        Ok(found)
    }

    async fn events_since(
        &self,
        contract: &ContractRef,
        from: EventCursor,
    ) -> Result<EventPage, LedgerError> {
        self.inner.counters.events.fetch_add(1, Ordering::SeqCst);
        self.check_ledger(contract)?;

        let mut entry = self
            .inner
            .contracts
            .get_mut(&contract.contract_id)
            .ok_or_else(|| LedgerError::UnknownContract(contract.clone()))?;
        let record = entry.value_mut();

        // The timeout is observed at the current tip, the first time anyone looks.
        if record.status == ContractStatus::Active
            && !record.expired_emitted
            && self.inner.clock.now() >= record.spec.refund_deadline
        {
            let height = self.height();
            record.expired_emitted = true;
            record.append(height, ContractEvent::Expired);
        }

        let start = usize::try_from(from.0).unwrap_or(usize::MAX);
        let events = record.log.iter().skip(start).cloned().collect();
        Ok(EventPage {
            tip_height: self.height(),
            events,
        })
    }

    fn watch(&self, contract: &ContractRef, from: EventCursor) -> EventStream {
        poll_events(
            self.clone(),
            contract.clone(),
            from,
            self.inner.poll_interval,
            self.inner.retry.clone(),
        )
    }

    fn ledger_id(&self) -> &LedgerId {
        &self.inner.ledger_id
    }
}
