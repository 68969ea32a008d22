use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use swap_core::{Amount, LedgerId, Timestamp};
use swap_crypto::{Commitment, Secret};

/// Reference to a hash-time-locked contract on a specific ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractRef {
    pub ledger_id: LedgerId,
    pub contract_id: String,
}

impl ContractRef {
    pub fn new(ledger_id: impl Into<LedgerId>, contract_id: impl Into<String>) -> Self {
        Self {
            ledger_id: ledger_id.into(),
            contract_id: contract_id.into(),
        }
    }
}

impl fmt::Display for ContractRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ledger_id, self.contract_id)
    }
}

/// What the core asks a ledger to lock.
///
/// `amount` is redeemable by `redeemer` with a secret matching `commitment`,
/// or refundable to `funder` once `refund_deadline` has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSpec {
    pub ledger_id: LedgerId,
    pub funder: String,
    pub redeemer: String,
    pub amount: Amount,
    pub commitment: Commitment,
    pub refund_deadline: Timestamp,
}

/// Proof that a ledger accepted a submission.
///
/// Acceptance is not finality: the core waits for the matching watcher event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub contract: ContractRef,
    /// Transaction reference on the underlying ledger.
    pub tx_ref: String,
    /// Wall-clock submission time, for reporting only.
    pub submitted_at: DateTime<Utc>,
}

/// Contract terms as observed on-chain when it was funded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundedContract {
    pub funder: String,
    pub redeemer: String,
    pub amount: Amount,
    pub commitment: Commitment,
    pub refund_deadline: Timestamp,
}

impl From<&ContractSpec> for FundedContract {
    fn from(spec: &ContractSpec) -> Self {
        Self {
            funder: spec.funder.clone(),
            redeemer: spec.redeemer.clone(),
            amount: spec.amount,
            commitment: spec.commitment,
            refund_deadline: spec.refund_deadline,
        }
    }
}

/// Normalized on-chain event of one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractEvent {
    Funded(FundedContract),
    /// Redeemed by revealing `secret`, which is now public.
    Redeemed { secret: Secret },
    Refunded,
    /// The refund timeout elapsed while the contract was still funded.
    Expired,
}

impl ContractEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Funded(_) => "Funded",
            Self::Redeemed { .. } => "Redeemed",
            Self::Refunded => "Refunded",
            Self::Expired => "Expired",
        }
    }
}

/// Position in a contract's event log: the sequence number of the next event
/// to deliver. Restarting a watch from a cursor never re-delivers events
/// before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct EventCursor(pub u64);

impl EventCursor {
    pub const START: EventCursor = EventCursor(0);

    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for EventCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A raw event as recorded by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Sequence number within the contract's log.
    pub seq: u64,
    /// Block height the event was finalized at.
    pub height: u64,
    pub event: ContractEvent,
}

impl LedgerEvent {
    /// Cursor pointing just after this event.
    pub fn cursor_after(&self) -> EventCursor {
        EventCursor(self.seq.saturating_add(1))
    }
}

/// One poll of a contract's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPage {
    pub tip_height: u64,
    pub events: Vec<LedgerEvent>,
}

/// Item of a contract watch stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchItem {
    Event(LedgerEvent),
    /// Current chain tip, emitted after every poll.
    Tip(u64),
}

/// An event the watcher considers final, ready for the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedEvent {
    /// Cursor to persist once this event has been processed.
    pub cursor: EventCursor,
    pub event: ContractEvent,
}
