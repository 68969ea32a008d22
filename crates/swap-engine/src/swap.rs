use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use swap_core::{
    Amount, Leg, LedgerId, SwapId, SwapParty, SwapState, SwapTimeouts, Timestamp,
};
use swap_crypto::{Commitment, Secret};
use swap_ledger::{ContractRef, ContractSpec, EventCursor, FundedContract};

/// Progress of one leg's contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegStatus {
    /// Nothing submitted yet.
    Unfunded,
    /// Funding submitted, not yet final on the ledger.
    Funding,
    /// Funding is final.
    Funded,
    /// Redeem submitted, awaiting the ledger event.
    Redeeming,
    Redeemed,
    /// Deadline passed while funded; refundable.
    Expired,
    /// Refund submitted, awaiting the ledger event.
    Refunding,
    Refunded,
}

impl LegStatus {
    /// Redeemed or Refunded. A leg never leaves these.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Redeemed | Self::Refunded)
    }
}

impl fmt::Display for LegStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unfunded => write!(f, "Unfunded"),
            Self::Funding => write!(f, "Funding"),
            Self::Funded => write!(f, "Funded"),
            Self::Redeeming => write!(f, "Redeeming"),
            Self::Redeemed => write!(f, "Redeemed"),
            Self::Expired => write!(f, "Expired"),
            Self::Refunding => write!(f, "Refunding"),
            Self::Refunded => write!(f, "Refunded"),
        }
    }
}

/// One funded contract of a swap and everything observed about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapLeg {
    pub leg: Leg,
    pub ledger_id: LedgerId,
    /// Locks the funds and receives the refund.
    pub funder: String,
    /// Receives the funds on redemption.
    pub redeemer: String,
    pub amount: Amount,
    pub status: LegStatus,
    /// Refund deadline chosen when funding was submitted.
    pub deadline: Option<Timestamp>,
    pub contract: Option<ContractRef>,
    /// Terms as reported by the ledger once funding was final.
    pub observed: Option<FundedContract>,
    /// Cursor after the last event applied to this leg.
    pub cursor: EventCursor,
    pub redeem_attempts: u32,
    /// When the last redeem or refund was submitted.
    #[serde(default)]
    pub submitted_at: Option<Timestamp>,
    pub funded_at: Option<Timestamp>,
    pub redeemed_at: Option<Timestamp>,
    pub refunded_at: Option<Timestamp>,
}

impl SwapLeg {
    fn new(leg: Leg, funder: &SwapParty, redeemer: &SwapParty) -> Self {
        Self {
            leg,
            ledger_id: funder.ledger_id.clone(),
            funder: funder.address.clone(),
            redeemer: redeemer.receive_address.clone(),
            amount: funder.amount,
            status: LegStatus::Unfunded,
            deadline: None,
            contract: None,
            observed: None,
            cursor: EventCursor::START,
            redeem_attempts: 0,
            submitted_at: None,
            funded_at: None,
            redeemed_at: None,
            refunded_at: None,
        }
    }

    /// Whether this leg may still have value locked on its ledger.
    pub fn holds_funds(&self) -> bool {
        match self.status {
            LegStatus::Unfunded | LegStatus::Redeemed | LegStatus::Refunded => false,
            // Without a contract reference the submission may still have landed.
            LegStatus::Funding
            | LegStatus::Funded
            | LegStatus::Redeeming
            | LegStatus::Expired
            | LegStatus::Refunding => true,
        }
    }

    /// Whether the last redeem or refund submission has gone unanswered for
    /// at least `after`.
    pub fn submission_stale(&self, now: Timestamp, after: Duration) -> bool {
        self.submitted_at
            .map_or(true, |at| now.saturating_duration_since(at) >= after)
    }

    /// Deadline the ledger actually enforces, falling back to the one submitted.
    pub fn effective_deadline(&self) -> Option<Timestamp> {
        self.observed
            .as_ref()
            .map(|o| o.refund_deadline)
            .or(self.deadline)
    }

    pub fn contract_spec(&self, commitment: Commitment, refund_deadline: Timestamp) -> ContractSpec {
        ContractSpec {
            ledger_id: self.ledger_id.clone(),
            funder: self.funder.clone(),
            redeemer: self.redeemer.clone(),
            amount: self.amount,
            commitment,
            refund_deadline,
        }
    }
}

/// The full record of one swap, owned by its state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swap {
    pub id: SwapId,
    pub initiator: SwapParty,
    pub responder: SwapParty,
    pub timeouts: SwapTimeouts,
    pub commitment: Commitment,
    pub state: SwapState,
    pub initiator_leg: SwapLeg,
    pub responder_leg: SwapLeg,
    /// The initiator's secret, kept so the vault can be restored after a restart.
    pub stored_secret: Option<Secret>,
    /// Secret published on-chain by the initiator's redemption.
    pub revealed_secret: Option<Secret>,
    /// Why a party refused to proceed, if one did.
    pub decline_reason: Option<String>,
    pub failure: Option<String>,
    /// Set when the legs settled inconsistently. Needs operator attention.
    pub alarm: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub settled_at: Option<Timestamp>,
}

impl Swap {
    pub fn new(
        id: SwapId,
        initiator: SwapParty,
        responder: SwapParty,
        timeouts: SwapTimeouts,
        secret: Secret,
        now: Timestamp,
    ) -> Self {
        let initiator_leg = SwapLeg::new(Leg::Initiator, &initiator, &responder);
        let responder_leg = SwapLeg::new(Leg::Responder, &responder, &initiator);
        Self {
            id,
            commitment: secret.commitment(),
            initiator,
            responder,
            timeouts,
            state: SwapState::Created,
            initiator_leg,
            responder_leg,
            stored_secret: Some(secret),
            revealed_secret: None,
            decline_reason: None,
            failure: None,
            alarm: None,
            created_at: now,
            updated_at: now,
            settled_at: None,
        }
    }

    pub fn leg(&self, leg: Leg) -> &SwapLeg {
        match leg {
            Leg::Initiator => &self.initiator_leg,
            Leg::Responder => &self.responder_leg,
        }
    }

    pub fn leg_mut(&mut self, leg: Leg) -> &mut SwapLeg {
        match leg {
            Leg::Initiator => &mut self.initiator_leg,
            Leg::Responder => &mut self.responder_leg,
        }
    }

    pub fn deadline_initiator(&self) -> Option<Timestamp> {
        self.initiator_leg.effective_deadline()
    }

    pub fn deadline_responder(&self) -> Option<Timestamp> {
        self.responder_leg.effective_deadline()
    }

    /// Final state reached and no value left on either ledger.
    pub fn is_settled(&self) -> bool {
        self.state.is_final() && !self.initiator_leg.holds_funds() && !self.responder_leg.holds_funds()
    }

    pub fn status(&self) -> SwapStatus {
        SwapStatus {
            swap_id: self.id,
            state: self.state,
            commitment: self.commitment,
            deadline_initiator: self.deadline_initiator(),
            deadline_responder: self.deadline_responder(),
            initiator_contract: self.initiator_leg.contract.clone(),
            responder_contract: self.responder_leg.contract.clone(),
            initiator_leg: self.initiator_leg.status,
            responder_leg: self.responder_leg.status,
            decline_reason: self.decline_reason.clone(),
            failure: self.failure.clone(),
            alarm: self.alarm.clone(),
            updated_at: self.updated_at,
            settled_at: self.settled_at,
        }
    }
}

/// Consistent snapshot of a swap, as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapStatus {
    pub swap_id: SwapId,
    pub state: SwapState,
    pub commitment: Commitment,
    pub deadline_initiator: Option<Timestamp>,
    pub deadline_responder: Option<Timestamp>,
    pub initiator_contract: Option<ContractRef>,
    pub responder_contract: Option<ContractRef>,
    pub initiator_leg: LegStatus,
    pub responder_leg: LegStatus,
    pub decline_reason: Option<String>,
    pub failure: Option<String>,
    pub alarm: Option<String>,
    pub updated_at: Timestamp,
    pub settled_at: Option<Timestamp>,
}
