//! Write batch
//!
//! In-memory cache of staged entries awaiting a single commit.

use std::collections::BTreeMap;

use bytes::Bytes;

/// Staged key-value pairs for one commit
///
/// Keys are kept ordered so a committed frame lays records out in index order.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    entries: BTreeMap<Vec<u8>, Bytes>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a key-value pair, replacing any value already staged for the key
    pub fn put(&mut self, key: Vec<u8>, value: Bytes) {
        self.entries.insert(key, value);
    }

    pub fn get(&self, key: &[u8]) -> Option<&Bytes> {
        self.entries.get(key)
    }

    /// Number of staged keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Bytes)> {
        self.entries.iter()
    }

    /// Clear all staged entries (after a successful commit)
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrite_replaces_staged_value() {
        let mut batch = WriteBatch::new();
        batch.put(b"k".to_vec(), Bytes::from_static(b"long value"));
        batch.put(b"k".to_vec(), Bytes::from_static(b"v"));

        assert_eq!(batch.len(), 1);
        assert_eq!(batch.get(b"k").unwrap().as_ref(), b"v");
    }
}
