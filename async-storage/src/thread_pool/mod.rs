//! Thread pools that run blocking engine calls on behalf of
//! [`KvStore`](crate::KvStore).

use crate::Result;

/// ThreadPool trait that describes
/// the functionality of a thread pool capable of
/// spawning and managing threads to perform tasks.
///
/// A job that panics must not take the pool down with it.
pub trait ThreadPool: Clone + Send + Sync + 'static {
    /// create a pool with `capacity` workers
    fn new(capacity: usize) -> Result<Self>;

    /// run `f` on some worker
    fn spawn<F: FnOnce() + Send + 'static>(&self, f: F);
}

mod naive;
mod rayon_pool;
mod shared_queue;

pub use naive::NaiveThreadPool;
pub use rayon_pool::RayonThreadPool;
pub use shared_queue::SharedQueueThreadPool;

fn check_capacity(capacity: usize) -> Result<()> {
    if capacity == 0 {
        Err(crate::StoreError::new(
            crate::StoreErrorKind::InvalidConfig,
            "thread pool needs at least one worker",
        ))
    } else {
        Ok(())
    }
}
