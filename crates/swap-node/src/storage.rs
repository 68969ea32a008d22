//! RocksDB storage backend for the atomicswaps node.

use anyhow::Result;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, DB};
use serde::{Deserialize, Serialize};
use std::path::Path;
use swap_core::{SwapId, Timestamp};
use swap_engine::{StoreError, Swap, SwapStore};

/// Column family names for different data types.
const CF_SWAPS: &str = "swaps";
const CF_STATE: &str = "state";

const CLOCK_CHECKPOINT_KEY: &str = "clock_checkpoint";

/// Last monotonic time the node is known to have reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockCheckpoint {
    pub timestamp: Timestamp,
    /// Wall-clock time of the checkpoint, for operators only.
    pub written_at: String,
}

/// RocksDB-backed storage for the atomicswaps node.
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open or create a RocksDB database at the given path with column families.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_SWAPS, Options::default()),
            ColumnFamilyDescriptor::new(CF_STATE, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self { db })
    }

    fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| anyhow::anyhow!("column family '{}' not found", cf_name))?;
        self.db.put_cf(&cf, key, value)?;
        Ok(())
    }

    fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| anyhow::anyhow!("column family '{}' not found", cf_name))?;
        let value = self.db.get_cf(&cf, key)?;
        Ok(value)
    }

    fn remove(&self, cf_name: &str, key: &[u8]) -> Result<()> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| anyhow::anyhow!("column family '{}' not found", cf_name))?;
        self.db.delete_cf(&cf, key)?;
        Ok(())
    }

    fn values(&self, cf_name: &str) -> Result<Vec<Vec<u8>>> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| anyhow::anyhow!("column family '{}' not found", cf_name))?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            out.push(value.to_vec());
        }
        Ok(out)
    }

    /// Persist the clock position so a restarted node never moves time backwards.
    pub fn save_clock_checkpoint(&self, timestamp: Timestamp) -> Result<()> {
        let checkpoint = ClockCheckpoint {
            timestamp,
            written_at: chrono::Utc::now().to_rfc3339(),
        };
        let bytes = serde_json::to_vec(&checkpoint)?;
        self.put(CF_STATE, CLOCK_CHECKPOINT_KEY.as_bytes(), &bytes)
    }

    pub fn load_clock_checkpoint(&self) -> Result<Option<ClockCheckpoint>> {
        match self.get(CF_STATE, CLOCK_CHECKPOINT_KEY.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Flush memtables to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        for cf_name in [CF_SWAPS, CF_STATE] {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.flush_cf(&cf)?;
            }
        }
        Ok(())
    }
}

fn backend(e: anyhow::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl SwapStore for Storage {
    fn save(&self, swap: &Swap) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(swap)?;
        self.put(CF_SWAPS, swap.id.to_string().as_bytes(), &bytes)
            .map_err(backend)
    }

    fn load(&self, id: &SwapId) -> Result<Option<Swap>, StoreError> {
        match self.get(CF_SWAPS, id.to_string().as_bytes()).map_err(backend)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn load_all(&self) -> Result<Vec<Swap>, StoreError> {
        self.values(CF_SWAPS)
            .map_err(backend)?
            .iter()
            .map(|bytes| serde_json::from_slice(bytes).map_err(StoreError::from))
            .collect()
    }

    fn delete(&self, id: &SwapId) -> Result<(), StoreError> {
        self.remove(CF_SWAPS, id.to_string().as_bytes())
            .map_err(backend)
    }
}
