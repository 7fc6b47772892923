use crate::{Key, Value};

/// A single mutation inside a [`WriteBatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// insert or overwrite `key`
    Put {
        /// the string key
        key: Key,
        /// the value stored under key
        val: Value,
    },

    /// delete `key`, a no-op when absent
    Delete {
        /// the string key
        key: Key,
    },
}

/// Ordered group of mutations applied by a backend as one atomic unit.
///
/// When several ops touch the same key the last one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// queue an insert
    pub fn put(&mut self, key: Key, val: Value) {
        self.ops.push(BatchOp::Put { key, val });
    }

    /// queue a delete
    pub fn delete(&mut self, key: Key) {
        self.ops.push(BatchOp::Delete { key });
    }

    /// number of queued ops
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// true when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl IntoIterator for WriteBatch {
    type Item = BatchOp;
    type IntoIter = std::vec::IntoIter<BatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

impl From<Vec<(Key, Value)>> for WriteBatch {
    fn from(entries: Vec<(Key, Value)>) -> Self {
        let ops = entries
            .into_iter()
            .map(|(key, val)| BatchOp::Put { key, val })
            .collect();
        Self { ops }
    }
}

impl From<Vec<Key>> for WriteBatch {
    fn from(keys: Vec<Key>) -> Self {
        let ops = keys.into_iter().map(|key| BatchOp::Delete { key }).collect();
        Self { ops }
    }
}
