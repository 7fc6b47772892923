use super::ThreadPool;
use crate::Result;
use std::thread;
use tracing::error;

/// Spawns a fresh thread for every job
#[derive(Debug, Clone)]
pub struct NaiveThreadPool;

impl ThreadPool for NaiveThreadPool {
    fn new(capacity: usize) -> Result<Self> {
        super::check_capacity(capacity)?;
        Ok(Self)
    }

    fn spawn<F: FnOnce() + Send + 'static>(&self, f: F) {
        if let Err(err) = thread::Builder::new()
            .name("storage-naive".to_owned())
            .spawn(f)
        {
            error!("failed to spawn job thread: {}", err);
        }
    }
}
