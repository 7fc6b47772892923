#![deny(missing_docs)]
#![warn(rust_2018_idioms)]

//! This crate provides an asynchronous, batched key-value store layered
//! over an embedded storage engine.
//!
//! [`KvStore`] implements the [`AsyncStorage`] API: multi-key get, atomic
//! multi-key set and remove, clear, and ordered key listing (all keys, by
//! prefix, or by range). Blocking engine calls run on a [`thread_pool`] and
//! complete through a channel, so callers only ever await.
//!
//! [`StorageModule`] bridges the store to a host runtime that speaks JSON
//! arguments and completion callbacks.

mod bridge;
mod config;
mod error;
mod storage;
mod store;
pub mod thread_pool;

#[macro_use]
extern crate failure;
pub use bridge::{Callback, ErrorPayload, Reply, Request, StorageModule};
pub use config::{BackendKind, PoolKind, StoreConfig};
pub use error::{ErrorCategory, StoreError, StoreErrorKind};
pub use storage::{
    open_backend, BatchOp, KeyQuery, KeyRange, MemoryBackend, SledBackend, StorageBackend,
    WriteBatch,
};
pub use store::{AsyncStorage, KvStore};

/// Result type used by this crate
pub type Result<T> = core::result::Result<T, StoreError>;

/// Keys are UTF-8 strings, ordered byte-lexicographically
pub type Key = String;

/// Values are arbitrary byte sequences
pub type Value = Vec<u8>;
