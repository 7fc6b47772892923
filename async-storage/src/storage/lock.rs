use crate::{Result, StoreError, StoreErrorKind};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error};

// canonical directories currently held open by this process
static OPEN_NAMESPACES: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Claim on a storage directory, released on drop.
///
/// Acquisition never waits: a directory that is already claimed fails
/// immediately with `StoreLocked`.
#[derive(Debug)]
pub(crate) struct NamespaceLock {
    path: PathBuf,
}

impl NamespaceLock {
    /// `path` must already be canonical
    pub(crate) fn acquire(path: &Path) -> Result<Self> {
        let mut open = OPEN_NAMESPACES
            .lock()
            .map_err(|_| StoreError::from(StoreErrorKind::LockPoisoned))?;

        if !open.insert(path.to_path_buf()) {
            return Err(StoreError::new(
                StoreErrorKind::StoreLocked,
                format!("{} is already open", path.display()),
            ));
        }
        debug!("acquired namespace {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for NamespaceLock {
    fn drop(&mut self) {
        match OPEN_NAMESPACES.lock() {
            Ok(mut open) => {
                open.remove(&self.path);
                debug!("released namespace {}", self.path.display());
            }
            Err(_) => error!("namespace registry poisoned, {} stays claimed", self.path.display()),
        }
    }
}
