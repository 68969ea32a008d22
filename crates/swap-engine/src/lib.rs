//! Atomicswaps Engine
//!
//! The per-swap state machine that drives both legs of an atomic swap
//! through their ledgers, the coordinator that owns all live swaps, and the
//! persistence contract used to survive restarts.

pub mod error;
pub mod swap;
pub mod registry;
pub mod store;
pub mod machine;
pub mod coordinator;

pub use coordinator::{SwapCoordinator, SweepReport};
pub use error::{EngineError, StoreError};
pub use machine::{Directive, EngineContext, RoutedEvent, SwapInput, SwapStateMachine};
pub use registry::LedgerRegistry;
pub use store::{MemoryStore, SwapStore};
pub use swap::{LegStatus, Swap, SwapLeg, SwapStatus};
