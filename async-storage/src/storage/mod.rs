mod batch;
mod kvsled;
mod lock;
mod memory;
mod query;

pub use batch::{BatchOp, WriteBatch};
pub use kvsled::SledBackend;
pub use memory::MemoryBackend;
pub use query::{KeyQuery, KeyRange};

use crate::{BackendKind, Key, Result, StoreConfig, Value};
use std::sync::Arc;

/// Synchronous contract with an embedded, ordered storage engine.
///
/// Calls may block on disk I/O; [`KvStore`](crate::KvStore) runs them on
/// its thread pool.
pub trait StorageBackend: Send + Sync {
    /// value stored under `key`, `None` when absent
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// apply every op of `batch` or none of them
    fn apply(&self, batch: WriteBatch) -> Result<()>;

    /// keys selected by `query`, ascending
    fn scan(&self, query: &KeyQuery) -> Result<Vec<Key>>;

    /// make completed writes durable
    fn flush(&self) -> Result<()>;

    /// short engine name for logs
    fn name(&self) -> &'static str;
}

/// open the backend selected by `config`
pub fn open_backend(config: &StoreConfig) -> Result<Arc<dyn StorageBackend>> {
    match config.backend {
        BackendKind::Sled => Ok(Arc::new(SledBackend::open(&config.path, config)?)),
        BackendKind::Memory => Ok(Arc::new(MemoryBackend::new())),
    }
}
