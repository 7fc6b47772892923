use super::lock::NamespaceLock;
use super::{BatchOp, KeyQuery, StorageBackend, WriteBatch};
use crate::{Key, Result, StoreConfig, StoreError, StoreErrorKind, Value};
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Wrapper around a sled database.
///
/// The directory is claimed for the lifetime of the backend, so at most one
/// instance per directory exists in this process. sled's own file lock
/// keeps other processes out.
///
/// # Examples
/// ```
/// # use async_storage::{SledBackend, StorageBackend, StoreConfig, WriteBatch};
/// # use tempfile::TempDir;
/// let dir = TempDir::new().unwrap();
/// let sled = SledBackend::open(dir.path(), &StoreConfig::default()).unwrap();
///
/// let mut batch = WriteBatch::new();
/// batch.put("Key".to_owned(), b"Value".to_vec());
/// sled.apply(batch).unwrap();
///
/// assert_eq!(Some(b"Value".to_vec()), sled.get("Key").unwrap());
/// ```
pub struct SledBackend {
    db: sled::Db,
    path: PathBuf,
    // declared last so the engine closes before the claim is released
    _lock: NamespaceLock,
}

impl SledBackend {
    /// open the database rooted at `path`, creating it if needed
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        fs::create_dir_all(path.as_ref())?;
        let path = fs::canonicalize(path.as_ref())?;
        let lock = NamespaceLock::acquire(&path)?;

        let db = sled::Config::new()
            .path(&path)
            .cache_capacity(config.cache_capacity)
            .open()?;
        debug!("opened sled database at {}", path.display());

        Ok(Self {
            db,
            path,
            _lock: lock,
        })
    }
}

fn decode_key(raw: sled::IVec) -> Result<Key> {
    String::from_utf8(raw.to_vec()).map_err(|err| {
        StoreError::new(
            StoreErrorKind::CorruptedKey,
            format!(
                "key of {} bytes is invalid at offset {}",
                err.as_bytes().len(),
                err.utf8_error().valid_up_to()
            ),
        )
    })
}

fn to_byte_bound(bound: Bound<&str>) -> Bound<Vec<u8>> {
    match bound {
        Bound::Included(key) => Bound::Included(key.as_bytes().to_vec()),
        Bound::Excluded(key) => Bound::Excluded(key.as_bytes().to_vec()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

impl StorageBackend for SledBackend {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let res = self.db.get(key)?;
        Ok(res.map(|ivec| ivec.to_vec()))
    }

    fn apply(&self, batch: WriteBatch) -> Result<()> {
        let mut sled_batch = sled::Batch::default();
        for op in batch {
            match op {
                BatchOp::Put { key, val } => sled_batch.insert(key.as_bytes(), val),
                BatchOp::Delete { key } => sled_batch.remove(key.as_bytes()),
            }
        }
        self.db.apply_batch(sled_batch)?;
        Ok(())
    }

    fn scan(&self, query: &KeyQuery) -> Result<Vec<Key>> {
        let iter = match query {
            KeyQuery::All => self.db.iter(),
            KeyQuery::Prefix(prefix) => self.db.scan_prefix(prefix.as_bytes()),
            KeyQuery::Range(range) => {
                if range.is_empty() {
                    return Ok(Vec::new());
                }
                self.db
                    .range((to_byte_bound(range.lower()), to_byte_bound(range.upper())))
            }
        };

        iter.keys()
            .map(|res| -> Result<Key> { decode_key(res?) })
            .collect::<Result<Vec<Key>>>()
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sled"
    }
}

impl Drop for SledBackend {
    fn drop(&mut self) {
        if let Err(err) = self.db.flush() {
            error!("flushing {} on close failed: {}", self.path.display(), err);
        }
    }
}
