use dashmap::DashMap;
use swap_core::SwapId;

use crate::error::StoreError;
use crate::swap::Swap;

/// Durable home of swap records.
///
/// The state machine saves the whole record after every processed input and
/// before every ledger submission, so a reload always sees the last applied
/// transition together with the watcher cursors that led to it, and any
/// submission that may be in flight.
pub trait SwapStore: Send + Sync {
    fn save(&self, swap: &Swap) -> Result<(), StoreError>;

    fn load(&self, id: &SwapId) -> Result<Option<Swap>, StoreError>;

    fn load_all(&self) -> Result<Vec<Swap>, StoreError>;

    fn delete(&self, id: &SwapId) -> Result<(), StoreError>;
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    swaps: DashMap<SwapId, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.swaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.swaps.is_empty()
    }
}

// Records are kept serialized so that reloads go through the same path as
// a real backend.
impl SwapStore for MemoryStore {
    fn save(&self, swap: &Swap) -> Result<(), StoreError> {
        let json = serde_json::to_string(swap)?;
        self.swaps.insert(swap.id, json);
        Ok(())
    }

    fn load(&self, id: &SwapId) -> Result<Option<Swap>, StoreError> {
        match self.swaps.get(id) {
            Some(json) => Ok(Some(serde_json::from_str(json.value())?)),
            None => Ok(None),
        }
    }

    fn load_all(&self) -> Result<Vec<Swap>, StoreError> {
        self.swaps
            .iter()
            .map(|entry| serde_json::from_str(entry.value()).map_err(StoreError::from))
            .collect()
    }

    fn delete(&self, id: &SwapId) -> Result<(), StoreError> {
        self.swaps.remove(id);
        Ok(())
    }
}
