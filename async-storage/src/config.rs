use crate::{Result, StoreError, StoreErrorKind};
use failure::ResultExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Engine behind the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// persistent sled database
    Sled,
    /// volatile in-process map
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sled" => Ok(Self::Sled),
            "memory" => Ok(Self::Memory),
            _ => Err(format!("Unsupported backend {}", s)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Sled => write!(f, "sled"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Thread pool running engine calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    /// a fresh thread per job
    Naive,
    /// fixed workers on a shared queue
    SharedQueue,
    /// rayon's pool
    Rayon,
}

impl FromStr for PoolKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "naive" => Ok(Self::Naive),
            "shared_queue" => Ok(Self::SharedQueue),
            "rayon" => Ok(Self::Rayon),
            _ => Err(format!("Unsupported thread pool {}", s)),
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Naive => write!(f, "naive"),
            Self::SharedQueue => write!(f, "shared_queue"),
            Self::Rayon => write!(f, "rayon"),
        }
    }
}

/// Settings for opening a store.
///
/// Every field has a default, so a config file only names what it changes:
///
/// ```json
/// { "path": "./data", "backend": "sled", "pool": "rayon", "threads": 8 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// storage directory, ignored by the memory backend
    pub path: PathBuf,
    /// engine to open
    pub backend: BackendKind,
    /// pool running engine calls
    pub pool: PoolKind,
    /// worker count of the pool
    pub threads: usize,
    /// flush the engine after every write batch
    pub sync_writes: bool,
    /// longest accepted key, in bytes
    pub max_key_len: usize,
    /// sled page cache size, in bytes
    pub cache_capacity: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./storage"),
            backend: BackendKind::Sled,
            pool: PoolKind::SharedQueue,
            threads: 4,
            sync_writes: true,
            max_key_len: 4096,
            cache_capacity: 64 * 1024 * 1024,
        }
    }
}

impl StoreConfig {
    /// parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self> {
        let config: StoreConfig =
            serde_json::from_str(json).context(StoreErrorKind::InvalidConfig)?;
        config.validate()?;
        Ok(config)
    }

    /// read, parse and validate a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|err| {
            StoreError::new(
                StoreErrorKind::InvalidConfig,
                format!("failed to read config file {}, err: {}", path.display(), err),
            )
        })?;
        Self::from_json(&json)
    }

    /// reject settings the store cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(invalid("threads must be at least 1"));
        }
        if self.max_key_len == 0 {
            return Err(invalid("max_key_len must be at least 1"));
        }
        if self.backend == BackendKind::Sled && self.cache_capacity == 0 {
            return Err(invalid("cache_capacity must be positive for sled"));
        }
        Ok(())
    }
}

fn invalid(detail: &str) -> StoreError {
    StoreError::new(StoreErrorKind::InvalidConfig, detail)
}
