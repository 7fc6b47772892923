use super::{BatchOp, KeyQuery, StorageBackend, WriteBatch};
use crate::{Key, Result, StoreError, StoreErrorKind, Value};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock};

/// Volatile ordered map implementing [`StorageBackend`].
///
/// Cloning shares the underlying map. Nothing survives the last clone.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    map: Arc<RwLock<BTreeMap<Key, Value>>>,
}

impl MemoryBackend {
    /// an empty backend
    pub fn new() -> MemoryBackend {
        MemoryBackend::default()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreErrorKind::LockPoisoned.into()
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let map_locked = self.map.read().map_err(poisoned)?;
        Ok(map_locked.get(key).cloned())
    }

    fn apply(&self, batch: WriteBatch) -> Result<()> {
        // ops cannot fail once the lock is held, so the batch lands whole
        let mut map_locked = self.map.write().map_err(poisoned)?;
        for op in batch {
            match op {
                BatchOp::Put { key, val } => {
                    map_locked.insert(key, val);
                }
                BatchOp::Delete { key } => {
                    map_locked.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan(&self, query: &KeyQuery) -> Result<Vec<Key>> {
        let map_locked = self.map.read().map_err(poisoned)?;
        let keys = match query {
            KeyQuery::All => map_locked.keys().cloned().collect(),
            KeyQuery::Prefix(prefix) => map_locked
                .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
                .map(|(key, _)| key)
                .take_while(|key| query.matches(key))
                .cloned()
                .collect(),
            KeyQuery::Range(range) => {
                if range.is_empty() {
                    return Ok(Vec::new());
                }
                map_locked
                    .range::<str, _>((range.lower(), range.upper()))
                    .map(|(key, _)| key.clone())
                    .collect()
            }
        };
        Ok(keys)
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyRange;

    fn backend_with(keys: &[&str]) -> MemoryBackend {
        let backend = MemoryBackend::new();
        let mut batch = WriteBatch::new();
        for key in keys {
            batch.put(key.to_string(), key.as_bytes().to_vec());
        }
        backend.apply(batch).unwrap();
        backend
    }

    #[test]
    fn later_ops_in_a_batch_win() {
        let backend = MemoryBackend::new();
        let mut batch = WriteBatch::new();
        batch.put("k".to_owned(), b"1".to_vec());
        batch.put("k".to_owned(), b"2".to_vec());
        batch.delete("gone".to_owned());
        batch.put("gone".to_owned(), b"3".to_vec());
        batch.delete("gone".to_owned());
        backend.apply(batch).unwrap();

        assert_eq!(backend.get("k").unwrap(), Some(b"2".to_vec()));
        assert_eq!(backend.get("gone").unwrap(), None);
    }

    #[test]
    fn prefix_scan_stops_after_matching_run() {
        let backend = backend_with(&["ab1", "ac1", "ab2", "a", "b"]);
        let keys = backend.scan(&KeyQuery::Prefix("ab".into())).unwrap();
        assert_eq!(keys, vec!["ab1", "ab2"]);
    }

    #[test]
    fn inverted_range_scans_nothing() {
        let backend = backend_with(&["a", "b", "c"]);
        let keys = backend
            .scan(&KeyQuery::Range(KeyRange::closed("c".into(), "a".into())))
            .unwrap();
        assert!(keys.is_empty());
    }
}
