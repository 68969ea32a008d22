use std::fmt;

use crate::error::CoreError;

/// The lifecycle states of a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SwapState {
    /// Swap accepted by the coordinator; nothing submitted yet.
    Created,
    /// The initiator leg has been submitted to its ledger.
    InitiatorFunding,
    /// The initiator leg is final on its ledger.
    InitiatorFunded,
    /// Both legs are final on their ledgers.
    ResponderFunded,
    /// The initiator redeemed the responder leg, publishing the secret.
    ResponderRedeemed,
    /// The responder redeemed the initiator leg. Final, success.
    InitiatorRedeemed,
    /// Every funded leg was refunded. Final, no funds lost.
    Refunded,
    /// A deadline passed without the swap completing and without an automatic refund. Final.
    Expired,
    /// Cancelled by its owner before any leg was confirmed. Final.
    Cancelled,
    /// The initiator leg could not be funded. Final.
    Failed,
    /// One leg redeemed while the other was refunded. Final, requires an operator.
    PartialFailure,
}

impl SwapState {
    /// Whether this is a final (terminal) state.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Self::InitiatorRedeemed
                | Self::Refunded
                | Self::Expired
                | Self::Cancelled
                | Self::Failed
                | Self::PartialFailure
        )
    }

    /// Whether the owner may still cancel. Once a leg is confirmed only
    /// timeout-governed refunds remain.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Created | Self::InitiatorFunding)
    }

    /// Whether at least one leg has been confirmed on-chain and the swap is still live.
    pub fn is_funded(&self) -> bool {
        matches!(
            self,
            Self::InitiatorFunded | Self::ResponderFunded | Self::ResponderRedeemed
        )
    }
}

impl fmt::Display for SwapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::InitiatorFunding => write!(f, "InitiatorFunding"),
            Self::InitiatorFunded => write!(f, "InitiatorFunded"),
            Self::ResponderFunded => write!(f, "ResponderFunded"),
            Self::ResponderRedeemed => write!(f, "ResponderRedeemed"),
            Self::InitiatorRedeemed => write!(f, "InitiatorRedeemed"),
            Self::Refunded => write!(f, "Refunded"),
            Self::Expired => write!(f, "Expired"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Failed => write!(f, "Failed"),
            Self::PartialFailure => write!(f, "PartialFailure"),
        }
    }
}

/// Facts that move a swap through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LifecycleEvent {
    /// The initiator leg was submitted to its ledger.
    FundingSubmitted,
    /// The initiator leg's `Funded` event became final.
    InitiatorLegFunded,
    /// The responder leg's `Funded` event became final.
    ResponderLegFunded,
    /// The responder leg was redeemed (the secret is now public).
    ResponderLegRedeemed,
    /// The initiator leg was redeemed.
    InitiatorLegRedeemed,
    /// No leg holds funds any more and every funded leg was refunded.
    LegsRefunded,
    /// A governing deadline passed.
    DeadlineExpired,
    /// The owner cancelled the swap.
    Cancelled,
    /// The initiator leg was definitively rejected by its ledger.
    FundingFailed,
    /// One leg ended redeemed and the other refunded.
    ProtocolViolation,
}

/// Pure transition table of the swap lifecycle.
///
/// Valid transitions:
/// - Created → InitiatorFunding (FundingSubmitted)
/// - Created → Cancelled (Cancelled)
/// - Created → Failed (FundingFailed)
/// - InitiatorFunding → InitiatorFunded (InitiatorLegFunded)
/// - InitiatorFunding → Cancelled (Cancelled)
/// - InitiatorFunding → Failed (FundingFailed)
/// - InitiatorFunding → Expired (DeadlineExpired)
/// - InitiatorFunded → ResponderFunded (ResponderLegFunded)
/// - InitiatorFunded | ResponderFunded → Refunded (LegsRefunded)
/// - InitiatorFunded | ResponderFunded | ResponderRedeemed → Expired (DeadlineExpired)
/// - ResponderFunded → ResponderRedeemed (ResponderLegRedeemed)
/// - ResponderRedeemed → InitiatorRedeemed (InitiatorLegRedeemed)
/// - InitiatorFunded | ResponderFunded | ResponderRedeemed → PartialFailure (ProtocolViolation)
pub struct SwapLifecycle;

impl SwapLifecycle {
    /// Attempt a state transition based on an event.
    /// Returns the new state on success, or an error for invalid transitions.
    pub fn transition(current: SwapState, event: LifecycleEvent) -> Result<SwapState, CoreError> {
        use LifecycleEvent as E;
        use SwapState as S;

        let new_state = match (current, event) {
            // From Created
            (S::Created, E::FundingSubmitted) => S::InitiatorFunding,
            (S::Created, E::Cancelled) => S::Cancelled,
            (S::Created, E::FundingFailed) => S::Failed,

            // From InitiatorFunding
            (S::InitiatorFunding, E::InitiatorLegFunded) => S::InitiatorFunded,
            (S::InitiatorFunding, E::Cancelled) => S::Cancelled,
            (S::InitiatorFunding, E::FundingFailed) => S::Failed,
            (S::InitiatorFunding, E::DeadlineExpired) => S::Expired,

            // From InitiatorFunded
            (S::InitiatorFunded, E::ResponderLegFunded) => S::ResponderFunded,
            (S::InitiatorFunded, E::LegsRefunded) => S::Refunded,
            (S::InitiatorFunded, E::DeadlineExpired) => S::Expired,
            (S::InitiatorFunded, E::ProtocolViolation) => S::PartialFailure,

            // From ResponderFunded
            (S::ResponderFunded, E::ResponderLegRedeemed) => S::ResponderRedeemed,
            (S::ResponderFunded, E::LegsRefunded) => S::Refunded,
            (S::ResponderFunded, E::DeadlineExpired) => S::Expired,
            (S::ResponderFunded, E::ProtocolViolation) => S::PartialFailure,

            // From ResponderRedeemed
            (S::ResponderRedeemed, E::InitiatorLegRedeemed) => S::InitiatorRedeemed,
            (S::ResponderRedeemed, E::DeadlineExpired) => S::Expired,
            (S::ResponderRedeemed, E::ProtocolViolation) => S::PartialFailure,

            // All other transitions are invalid
            _ => {
                return Err(CoreError::InvalidStateTransition {
                    from: current,
                    event,
                });
            }
        };

        tracing::debug!(
            from = %current,
            to = %new_state,
            event = ?event,
            "swap state transition"
        );

        Ok(new_state)
    }

    /// Check if a transition is valid without performing it.
    pub fn can_transition(current: SwapState, event: LifecycleEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
