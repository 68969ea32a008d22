use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::error::CoreError;

/// Unique identifier for a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SwapId(pub Uuid);

impl SwapId {
    /// Create a new random swap ID (UUID v7, time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SwapId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SwapId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identifier of a ledger integration (e.g. "btc-regtest").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerId(pub String);

impl LedgerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LedgerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An amount in the smallest unit of the ledger it lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Amount(pub u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn new(value: u128) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of the swap a party plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Generates the secret and funds first, with the long timeout.
    Initiator,
    /// Funds second, with the short timeout, after verifying the initiator's leg.
    Responder,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiator => write!(f, "Initiator"),
            Self::Responder => write!(f, "Responder"),
        }
    }
}

/// One of the two funded contracts of a swap, named after the party that funds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Leg {
    /// Funded by the initiator on the initiator's ledger, redeemed by the responder.
    Initiator,
    /// Funded by the responder on the responder's ledger, redeemed by the initiator.
    Responder,
}

impl Leg {
    pub const BOTH: [Leg; 2] = [Leg::Initiator, Leg::Responder];

    pub fn funder(&self) -> Role {
        match self {
            Self::Initiator => Role::Initiator,
            Self::Responder => Role::Responder,
        }
    }

    pub fn other(&self) -> Leg {
        match self {
            Self::Initiator => Self::Responder,
            Self::Responder => Self::Initiator,
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiator => write!(f, "initiator-leg"),
            Self::Responder => write!(f, "responder-leg"),
        }
    }
}

/// A participant of a swap. Immutable once the swap is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParty {
    pub role: Role,
    /// Ledger this party funds its leg on.
    pub ledger_id: LedgerId,
    /// Funding (and refund) address on `ledger_id`.
    pub address: String,
    /// Address that receives the counterparty's funds on the counterparty's ledger.
    pub receive_address: String,
    /// Amount this party locks.
    pub amount: Amount,
}

impl SwapParty {
    pub fn new(
        role: Role,
        ledger_id: impl Into<LedgerId>,
        address: impl Into<String>,
        receive_address: impl Into<String>,
        amount: Amount,
    ) -> Self {
        Self {
            role,
            ledger_id: ledger_id.into(),
            address: address.into(),
            receive_address: receive_address.into(),
            amount,
        }
    }

    /// Basic sanity checks on a party as submitted by a caller.
    pub fn validate(&self, expected: Role) -> Result<(), CoreError> {
        if self.role != expected {
            return Err(CoreError::InvalidParty(format!(
                "expected {} but got {}",
                expected, self.role
            )));
        }
        if self.amount.is_zero() {
            return Err(CoreError::InvalidAmount(format!(
                "{} amount must be positive",
                self.role
            )));
        }
        if self.address.is_empty() || self.receive_address.is_empty() {
            return Err(CoreError::InvalidParty(format!(
                "{} addresses must not be empty",
                self.role
            )));
        }
        Ok(())
    }
}

impl From<String> for LedgerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The two refund timeouts of a swap.
///
/// `t_long` governs the initiator leg, `t_short` the responder leg. The
/// responder must always be able to reclaim its funds before the initiator can
/// reclaim its own, so `t_short < t_long` strictly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapTimeouts {
    pub t_long: Duration,
    pub t_short: Duration,
}

impl SwapTimeouts {
    pub fn new(t_long: Duration, t_short: Duration) -> Self {
        Self { t_long, t_short }
    }

    /// Reject timeouts that leave less than `min_safety_margin` between the legs.
    pub fn validate(&self, min_safety_margin: Duration) -> Result<(), CoreError> {
        if self.t_short.is_zero() {
            return Err(CoreError::InvalidTimeouts("T_short must be positive".into()));
        }
        if self.t_short >= self.t_long {
            return Err(CoreError::InvalidTimeouts(format!(
                "T_short ({:?}) must be strictly less than T_long ({:?})",
                self.t_short, self.t_long
            )));
        }
        let gap = self.t_long - self.t_short;
        if gap < min_safety_margin {
            return Err(CoreError::InvalidTimeouts(format!(
                "T_long - T_short ({:?}) is below the minimum safety margin ({:?})",
                gap, min_safety_margin
            )));
        }
        Ok(())
    }
}
