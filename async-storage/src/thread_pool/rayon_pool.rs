use super::ThreadPool;
use crate::{Result, StoreErrorKind};
use failure::ResultExt;
use std::sync::Arc;
use tracing::error;

/// Rayon ThreadPool
#[derive(Debug, Clone)]
pub struct RayonThreadPool {
    pool: Arc<rayon::ThreadPool>,
}

impl ThreadPool for RayonThreadPool {
    fn new(capacity: usize) -> Result<Self> {
        super::check_capacity(capacity)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(capacity)
            .thread_name(|i| format!("storage-rayon-{}", i))
            // rayon aborts the process on a panicking job unless a handler is set
            .panic_handler(|_| error!("storage job panicked on rayon worker"))
            .build()
            .context(StoreErrorKind::RayonError)?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    fn spawn<F: FnOnce() + Send + 'static>(&self, f: F) {
        self.pool.spawn(f);
    }
}
