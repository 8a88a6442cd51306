//! Value index: sparse (value, tuple-position) checkpoints for columns
//! sorted by their own value.
//!
//! ```text
//! records: [value (trait encoding), tuple: u64 BE] × n    (no header)
//! ```
//!
//! Entries are strictly increasing in both fields. The first entry holds
//! the file's minimum value (tuple 0) and the last its maximum, so a probe
//! outside `[min, max]` answers "not found" without touching the data
//! file.
//!
//! A lookup yields a *tuple position* to begin scanning from, not a byte
//! position: translating to bytes takes a position index (or the fixed
//! stride of a fixed-width file) unless the format self-indexes.

use crate::value::ColumnValue;
use lamina_core::error::{Error, Result};
use lamina_core::storage::{StorageRead, StorageWrite};
use lamina_core::wire;
use std::cmp::Ordering;

/// Loaded, validated value index.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueIndex<T: ColumnValue> {
    entries: Vec<(T, u64)>,
}

impl<T: ColumnValue> ValueIndex<T> {
    /// Wrap and validate a checkpoint list. Empty is valid (empty file).
    pub fn from_entries(entries: Vec<(T, u64)>) -> Result<Self> {
        for pair in entries.windows(2) {
            let ((v0, t0), (v1, t1)) = (&pair[0], &pair[1]);
            if v0.total_cmp(v1) != Ordering::Less || t1 <= t0 {
                return Err(Error::corrupt(format!(
                    "value index entries not strictly increasing at tuples {} and {}",
                    t0, t1
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Tuple position to begin scanning for `value`, or `None` when the
    /// probe lies outside the file's value range.
    ///
    /// The returned position is guaranteed to be at or before the first
    /// occurrence of `value`: when a checkpoint holds `value` itself the
    /// scan starts at the previous checkpoint, because earlier duplicates
    /// may precede the sampled tuple.
    pub fn search_value(&self, value: &T) -> Option<u64> {
        let first = self.entries.first()?;
        if value.total_cmp(&first.0) == Ordering::Less {
            return None;
        }
        let last = &self.entries[self.entries.len() - 1];
        if value.total_cmp(&last.0) == Ordering::Greater {
            return None;
        }
        // First entry with entry.value >= probe…
        let pp = self
            .entries
            .partition_point(|(v, _)| v.total_cmp(value) == Ordering::Less);
        // …then step back one checkpoint unless the probe equals the
        // minimum (pp == 0 implies value == first.value here).
        if pp == 0 {
            Some(self.entries[0].1)
        } else {
            Some(self.entries[pp - 1].1)
        }
    }

    pub fn entries(&self) -> &[(T, u64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load and validate a value index file.
    pub fn load(storage: &(impl StorageRead + ?Sized), name: &str) -> Result<Self> {
        let data = storage.read_all(name)?;
        let len = data.len() as u64;
        let mut r = std::io::Cursor::new(&data);
        let mut entries = Vec::new();
        while r.position() < len {
            let value = T::read_from(&mut r)?;
            let tuple = wire::read_u64(&mut r)?;
            entries.push((value, tuple));
        }
        Self::from_entries(entries)
    }

    /// Write the index to storage.
    pub fn store(&self, storage: &(impl StorageWrite + ?Sized), name: &str) -> Result<()> {
        let mut appender = storage.create_append(name)?;
        for (value, tuple) in &self.entries {
            value.write_to(&mut appender)?;
            wire::write_u64(&mut appender, *tuple)?;
        }
        appender.finish()
    }
}

/// Accumulates value checkpoints during a sorted-column write.
///
/// `observe` may be called with every sampled (value, tuple) pair; entries
/// that would break strict monotonicity (duplicate values between samples)
/// are skipped rather than rejected.
#[derive(Debug)]
pub struct ValueIndexBuilder<T: ColumnValue> {
    entries: Vec<(T, u64)>,
}

impl<T: ColumnValue> Default for ValueIndexBuilder<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: ColumnValue> ValueIndexBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a sampled checkpoint; kept only if strictly increasing.
    pub fn observe(&mut self, value: &T, tuple: u64) {
        match self.entries.last() {
            Some((last_value, last_tuple)) => {
                if value.total_cmp(last_value) == Ordering::Greater && tuple > *last_tuple {
                    self.entries.push((value.clone(), tuple));
                }
            }
            None => self.entries.push((value.clone(), tuple)),
        }
    }

    pub fn finish(self) -> Result<ValueIndex<T>> {
        ValueIndex::from_entries(self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lamina_core::storage::MemoryStorage;

    fn sample_index() -> ValueIndex<i32> {
        // A sorted column [10 ×4, 20 ×4, 30 ×4] sampled every 4 tuples.
        ValueIndex::from_entries(vec![(10, 0), (20, 4), (30, 8)]).unwrap()
    }

    #[test]
    fn test_search_within_range() {
        let idx = sample_index();
        assert_eq!(idx.search_value(&10), Some(0));
        // Probe between checkpoints: scan from the floor checkpoint.
        assert_eq!(idx.search_value(&15), Some(0));
        // Probe equal to a checkpoint: previous checkpoint, since earlier
        // duplicates may precede the sampled tuple.
        assert_eq!(idx.search_value(&20), Some(0));
        assert_eq!(idx.search_value(&30), Some(4));
        assert_eq!(idx.search_value(&25), Some(4));
    }

    #[test]
    fn test_search_outside_range() {
        let idx = sample_index();
        assert_eq!(idx.search_value(&9), None);
        assert_eq!(idx.search_value(&31), None);
        assert_eq!(ValueIndex::<i32>::from_entries(vec![]).unwrap().search_value(&5), None);
    }

    #[test]
    fn test_builder_skips_duplicate_values() {
        let mut b = ValueIndexBuilder::new();
        b.observe(&100i64, 0);
        b.observe(&100i64, 4); // duplicate value between samples — skipped
        b.observe(&200i64, 8);
        b.observe(&200i64, 11); // final-tuple sample with same value — skipped
        let idx = b.finish().unwrap();
        assert_eq!(idx.entries(), &[(100, 0), (200, 8)]);
    }

    #[test]
    fn test_store_load_round_trip_strings() {
        let storage = MemoryStorage::new();
        let idx = ValueIndex::from_entries(vec![
            ("apple".to_string(), 0),
            ("banana".to_string(), 128),
            ("cherry".to_string(), 256),
        ])
        .unwrap();
        idx.store(&storage, "col.vdx").unwrap();
        let loaded = ValueIndex::<String>::load(&storage, "col.vdx").unwrap();
        assert_eq!(loaded, idx);
        assert_eq!(loaded.search_value(&"banana".to_string()), Some(0));
        assert_eq!(loaded.search_value(&"zebra".to_string()), None);
    }

    #[test]
    fn test_load_rejects_unsorted() {
        let err = ValueIndex::from_entries(vec![(5i32, 0), (5, 10)]).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
        let err = ValueIndex::from_entries(vec![(5i32, 0), (9, 0)]).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }
}
