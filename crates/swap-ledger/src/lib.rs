//! Atomicswaps Ledger Layer
//!
//! Defines the narrow contract the swap core requires from any ledger
//! integration, the watcher that turns a ledger's raw event stream into
//! normalized swap input, retry/backoff at the ledger boundary, and an
//! in-memory simulated ledger used by tests and the demo node.

pub mod error;
pub mod types;
pub mod traits;
pub mod retry;
pub mod stream;
pub mod watcher;
pub mod adapters;

pub use error::LedgerError;
pub use types::{
    ContractEvent, ContractRef, ContractSpec, EventCursor, EventPage, FundedContract,
    LedgerEvent, ObservedEvent, Receipt, WatchItem,
};
pub use traits::{EventStream, LedgerAdapter};
pub use retry::{retry_transient, RetryConfig, RetryingLedger};
pub use stream::poll_events;
pub use watcher::{ContractWatcher, WatcherConfig};
pub use adapters::simulated::{CallCounts, ContractStatus, SimulatedLedger};
