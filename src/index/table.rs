//! Key index implementation
//!
//! HashMap-based table from canonical key bytes to [`IndexEntry`].

use std::collections::hash_map::{HashMap, Iter};

use super::IndexEntry;
use crate::log::Record;

/// Index from key to its latest live record
#[derive(Debug, Default, Clone)]
pub struct KeyIndex {
    entries: HashMap<Vec<u8>, IndexEntry>,
}

impl KeyIndex {
    /// Create a new empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key
    pub fn get(&self, key: &[u8]) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    /// Whether the key has a live entry (expired-but-unswept counts)
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    /// Point a key at a new record, returning the superseded entry
    pub fn insert(&mut self, key: Vec<u8>, entry: IndexEntry) -> Option<IndexEntry> {
        self.entries.insert(key, entry)
    }

    /// Remove a key, returning its entry if present
    pub fn remove(&mut self, key: &[u8]) -> Option<IndexEntry> {
        self.entries.remove(key)
    }

    /// Apply one replayed record at `offset`
    ///
    /// Values overwrite any earlier entry for the key; tombstones remove it.
    pub fn apply(&mut self, offset: u64, record: Record) {
        if record.tombstone {
            self.entries.remove(&record.key);
            return;
        }

        let entry = IndexEntry {
            offset,
            len: record.frame_len() as u32,
            expires_at: record.expires_at(),
        };
        self.entries.insert(record.key, entry);
    }

    /// Number of indexed keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in arbitrary order
    pub fn iter(&self) -> Iter<'_, Vec<u8>, IndexEntry> {
        self.entries.iter()
    }

    /// Entries sorted by file offset, i.e. oldest record first
    pub fn entries_by_offset(&self) -> Vec<(&[u8], &IndexEntry)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(key, entry)| (key.as_slice(), entry))
            .collect();
        entries.sort_by_key(|(_, entry)| entry.offset);
        entries
    }
}
