pub mod error;
pub mod types;
pub mod clock;
pub mod state_machine;
pub mod config;

pub use clock::{Clock, ManualClock, MonotonicClock, Timestamp};
pub use config::{CoordinatorConfig, RetrySettings, WatcherSettings};
pub use error::CoreError;
pub use state_machine::{LifecycleEvent, SwapLifecycle, SwapState};
pub use types::{Amount, Leg, LedgerId, Role, SwapId, SwapParty, SwapTimeouts};
