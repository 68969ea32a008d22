use async_trait::async_trait;
use futures::stream::BoxStream;
use swap_core::LedgerId;
use swap_crypto::Secret;

use crate::error::LedgerError;
use crate::types::{ContractRef, ContractSpec, EventCursor, EventPage, Receipt, WatchItem};

/// Restartable, infinite stream of a contract's events.
pub type EventStream = BoxStream<'static, Result<WatchItem, LedgerError>>;

/// Ledger adapter interface.
///
/// Each implementation bridges the swap core to one concrete ledger. The core
/// never sees chain-specific transaction formats, only this contract.
#[async_trait]
pub trait LedgerAdapter: Send + Sync {
    /// Lock `spec.amount` under `spec.commitment` until `spec.refund_deadline`.
    async fn fund(&self, spec: &ContractSpec) -> Result<ContractRef, LedgerError>;

    /// Redeem a contract by revealing its secret.
    async fn redeem(&self, contract: &ContractRef, secret: &Secret)
        -> Result<Receipt, LedgerError>;

    /// Reclaim a contract's funds after its refund deadline.
    async fn refund(&self, contract: &ContractRef) -> Result<Receipt, LedgerError>;

    /// Find the contract previously funded with exactly `spec`, if any.
    ///
    /// Lets the core reattach to a funding submission whose reply was lost,
    /// for instance because the process stopped while `fund` was in flight.
    async fn find_contract(&self, spec: &ContractSpec) -> Result<Option<ContractRef>, LedgerError>;

    /// Fetch the events of `contract` starting at `from`, plus the chain tip.
    async fn events_since(
        &self,
        contract: &ContractRef,
        from: EventCursor,
    ) -> Result<EventPage, LedgerError>;

    /// Watch `contract` from `from` onwards.
    ///
    /// Events of one contract arrive in the order they were finalized on the
    /// ledger; nothing stronger is promised.
    fn watch(&self, contract: &ContractRef, from: EventCursor) -> EventStream;

    /// Return the identifier of this ledger.
    fn ledger_id(&self) -> &LedgerId;
}
