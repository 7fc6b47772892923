use crate::storage::{open_backend, KeyQuery, KeyRange, SledBackend, StorageBackend, WriteBatch};
use crate::thread_pool::ThreadPool;
use crate::{Key, Result, StoreConfig, StoreError, StoreErrorKind, Value};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, error, trace};

/// Asynchronous API of a batched, ordered key-value store.
///
/// Every call completes exactly once, with its result or a typed error.
#[async_trait::async_trait]
pub trait AsyncStorage: Clone + Send + Sync + 'static {
    /// look up each key independently, keeping input order.
    /// Missing keys map to `None`.
    async fn multi_get(&self, keys: Vec<Key>) -> Result<Vec<(Key, Option<Value>)>>;

    /// write all entries as one atomic batch
    async fn multi_set(&self, entries: Vec<(Key, Value)>) -> Result<()>;

    /// delete all keys as one atomic batch, absent keys are ignored
    async fn multi_remove(&self, keys: Vec<Key>) -> Result<()>;

    /// remove every entry
    async fn clear(&self) -> Result<()>;

    /// every key, ascending
    async fn get_all_keys(&self) -> Result<Vec<Key>>;

    /// keys starting with `prefix`, ascending
    async fn get_all_keys_with_prefix(&self, prefix: Key) -> Result<Vec<Key>>;

    /// keys inside `range`, ascending
    async fn get_all_keys_in_range(&self, range: KeyRange) -> Result<Vec<Key>>;

    /// value of a single key
    async fn get_item(&self, key: Key) -> Result<Option<Value>> {
        let mut pairs = self.multi_get(vec![key]).await?;
        Ok(pairs.pop().and_then(|(_, val)| val))
    }

    /// set a single key
    async fn set_item(&self, key: Key, val: Value) -> Result<()> {
        self.multi_set(vec![(key, val)]).await
    }

    /// remove a single key
    async fn remove_item(&self, key: Key) -> Result<()> {
        self.multi_remove(vec![key]).await
    }
}

/// Batched key-value store driving a [`StorageBackend`] from a thread pool.
///
/// ```rust
/// use async_storage::{thread_pool::SharedQueueThreadPool, AsyncStorage, KvStore};
/// use tempfile::TempDir;
///
/// #[tokio::main]
/// async fn main() {
///     let temp_dir = TempDir::new().unwrap();
///     let store = KvStore::<SharedQueueThreadPool>::open(temp_dir.path(), 2).unwrap();
///
///     store.multi_set(vec![("key".to_owned(), b"value".to_vec())]).await.unwrap();
///     assert_eq!(Some(b"value".to_vec()), store.get_item("key".to_owned()).await.unwrap());
///
///     store.multi_remove(vec!["key".to_owned()]).await.unwrap();
///     assert_eq!(None, store.get_item("key".to_owned()).await.unwrap());
/// }
/// ```
#[derive(Clone)]
pub struct KvStore<P: ThreadPool> {
    // reads go straight to the engine
    read_half: ReadHalf,

    // writes are serialized so batches and clear never interleave
    write_half: Arc<Mutex<WriteHalf>>,
    max_key_len: usize,
    pool: P,
}

impl<P: ThreadPool> KvStore<P> {
    /// open a sled store at `path` with `capacity` pool workers and
    /// default settings otherwise
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let config = StoreConfig {
            path: path.into(),
            threads: capacity,
            ..StoreConfig::default()
        };
        config.validate()?;
        let backend = SledBackend::open(&config.path, &config)?;
        Self::with_backend(Arc::new(backend), &config)
    }

    /// open the backend and pool described by `config`.
    ///
    /// `config.pool` is ignored, the pool type is `P`.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let backend = open_backend(config)?;
        Self::with_backend(backend, config)
    }

    /// drive an already opened backend
    pub fn with_backend(backend: Arc<dyn StorageBackend>, config: &StoreConfig) -> Result<Self> {
        let pool = P::new(config.threads)?;
        debug!(
            "store ready on {} backend with {} workers",
            backend.name(),
            config.threads
        );

        Ok(Self {
            read_half: ReadHalf {
                backend: Arc::clone(&backend),
            },
            write_half: Arc::new(Mutex::new(WriteHalf {
                backend,
                sync_writes: config.sync_writes,
            })),
            max_key_len: config.max_key_len,
            pool,
        })
    }

    // we implement asynchrony on top of synchronous multi-threading:
    // the job runs on a pool thread and reports back through a oneshot channel,
    // which is itself a future. A job that panics drops the sender, so the
    // caller still gets exactly one answer.
    async fn execute<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        self.pool.spawn(move || {
            let res = job();
            if sender.send(res).is_err() {
                error!("Receiving End is dropped");
            }
        });

        match receiver.await {
            Ok(r) => r,
            Err(err) => Err(StoreError::from(err)),
        }
    }

    async fn write(&self, batch: WriteBatch) -> Result<()> {
        let write_half = Arc::clone(&self.write_half);
        self.execute(move || lock(&write_half)?.apply(batch)).await
    }

    async fn scan(&self, query: KeyQuery) -> Result<Vec<Key>> {
        let read_half = self.read_half.clone();
        self.execute(move || read_half.scan(&query)).await
    }
}

#[async_trait::async_trait]
impl<P: ThreadPool> AsyncStorage for KvStore<P> {
    async fn multi_get(&self, keys: Vec<Key>) -> Result<Vec<(Key, Option<Value>)>> {
        validate_keys(&keys, Some(self.max_key_len))?;
        let read_half = self.read_half.clone();
        self.execute(move || read_half.multi_get(keys)).await
    }

    async fn multi_set(&self, entries: Vec<(Key, Value)>) -> Result<()> {
        validate_keys(entries.iter().map(|(key, _)| key), Some(self.max_key_len))?;
        self.write(WriteBatch::from(entries)).await
    }

    async fn multi_remove(&self, keys: Vec<Key>) -> Result<()> {
        // no length limit: keys stored under a larger max_key_len stay removable
        validate_keys(&keys, None)?;
        self.write(WriteBatch::from(keys)).await
    }

    async fn clear(&self) -> Result<()> {
        let write_half = Arc::clone(&self.write_half);
        self.execute(move || lock(&write_half)?.clear()).await
    }

    async fn get_all_keys(&self) -> Result<Vec<Key>> {
        self.scan(KeyQuery::All).await
    }

    async fn get_all_keys_with_prefix(&self, prefix: Key) -> Result<Vec<Key>> {
        self.scan(KeyQuery::Prefix(prefix)).await
    }

    async fn get_all_keys_in_range(&self, range: KeyRange) -> Result<Vec<Key>> {
        self.scan(KeyQuery::Range(range)).await
    }
}

impl<P: ThreadPool> fmt::Debug for KvStore<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvStore")
            .field("backend", &self.read_half.backend.name())
            .field("max_key_len", &self.max_key_len)
            .finish()
    }
}

fn validate_keys<'a>(
    keys: impl IntoIterator<Item = &'a Key>,
    max_key_len: Option<usize>,
) -> Result<()> {
    for (i, key) in keys.into_iter().enumerate() {
        if key.is_empty() {
            return Err(StoreError::new(
                StoreErrorKind::InvalidKey,
                format!("key at position {} is empty", i),
            ));
        }
        match max_key_len {
            Some(limit) if key.len() > limit => {
                return Err(StoreError::new(
                    StoreErrorKind::KeyTooLong,
                    format!(
                        "key at position {} is {} bytes, limit is {}",
                        i,
                        key.len(),
                        limit
                    ),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

fn lock(write_half: &Mutex<WriteHalf>) -> Result<std::sync::MutexGuard<'_, WriteHalf>> {
    write_half
        .lock()
        .map_err(|_| StoreErrorKind::LockPoisoned.into())
}

#[derive(Clone)]
struct ReadHalf {
    backend: Arc<dyn StorageBackend>,
}

impl ReadHalf {
    fn multi_get(&self, keys: Vec<Key>) -> Result<Vec<(Key, Option<Value>)>> {
        trace!("multi_get of {} keys", keys.len());
        keys.into_iter()
            .map(|key| -> Result<(Key, Option<Value>)> {
                let val = self.backend.get(&key)?;
                Ok((key, val))
            })
            .collect()
    }

    fn scan(&self, query: &KeyQuery) -> Result<Vec<Key>> {
        let keys = self.backend.scan(query)?;
        debug!("scan {:?} produced {} keys", query, keys.len());
        Ok(keys)
    }
}

struct WriteHalf {
    backend: Arc<dyn StorageBackend>,
    sync_writes: bool,
}

impl WriteHalf {
    fn apply(&mut self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        debug!("applying batch of {} ops", batch.len());
        self.backend.apply(batch)?;
        if self.sync_writes {
            self.backend.flush()?;
        }
        Ok(())
    }

    // the key listing and the delete batch happen under the write lock,
    // so no write can land in between
    fn clear(&mut self) -> Result<()> {
        let keys = self.backend.scan(&KeyQuery::All)?;
        debug!("clearing {} keys", keys.len());
        self.apply(WriteBatch::from(keys))
    }
}
