//! Position index: sparse (tuple, byte-offset) checkpoints.
//!
//! ```text
//! entries: [tuple: u64 BE, byte_offset: u64 BE] × n    (no header)
//! ```
//!
//! The first entry is always `(0, 0)`; the final entry is a sentinel
//! `(total_tuples, total_bytes)`, which also yields the totals without a
//! separate header field. Entries are strictly increasing in both fields.
//! An empty column file is the single entry `(0, 0)`.

use lamina_core::error::{Error, Result};
use lamina_core::storage::{StorageRead, StorageWrite};
use lamina_core::wire;

/// Loaded, validated position index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionIndex {
    entries: Vec<(u64, u64)>,
}

impl PositionIndex {
    /// Wrap and validate a checkpoint list.
    pub fn from_entries(entries: Vec<(u64, u64)>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::corrupt("position index has no entries"));
        }
        if entries[0] != (0, 0) {
            return Err(Error::corrupt(format!(
                "position index must start at (0, 0), found {:?}",
                entries[0]
            )));
        }
        for pair in entries.windows(2) {
            let ((t0, b0), (t1, b1)) = (pair[0], pair[1]);
            if t1 <= t0 || b1 <= b0 {
                return Err(Error::corrupt(format!(
                    "position index entries not strictly increasing: ({}, {}) then ({}, {})",
                    t0, b0, t1, b1
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Floor search: the checkpoint with the largest tuple ≤ `tuple`.
    ///
    /// Callers scan forward from the returned byte offset to reach `tuple`
    /// exactly. Asking for a tuple at or past the end returns the sentinel.
    pub fn search_position(&self, tuple: u64) -> (u64, u64) {
        let pp = self.entries.partition_point(|&(t, _)| t <= tuple);
        // pp >= 1 because the first entry is (0, 0)
        self.entries[pp - 1]
    }

    /// Total tuples in the indexed file (from the sentinel).
    pub fn total_tuples(&self) -> u64 {
        self.entries[self.entries.len() - 1].0
    }

    /// Total data-file bytes (from the sentinel).
    pub fn total_bytes(&self) -> u64 {
        self.entries[self.entries.len() - 1].1
    }

    /// All checkpoints, sentinel included.
    pub fn entries(&self) -> &[(u64, u64)] {
        &self.entries
    }

    /// Number of entries, sentinel included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load and validate a position index file.
    pub fn load(storage: &(impl StorageRead + ?Sized), name: &str) -> Result<Self> {
        let data = storage.read_all(name)?;
        if data.len() % 16 != 0 {
            return Err(Error::corrupt(format!(
                "position index size {} is not a multiple of 16",
                data.len()
            )));
        }
        let mut entries = Vec::with_capacity(data.len() / 16);
        let mut r = std::io::Cursor::new(&data);
        for _ in 0..data.len() / 16 {
            let tuple = wire::read_u64(&mut r)?;
            let offset = wire::read_u64(&mut r)?;
            entries.push((tuple, offset));
        }
        Self::from_entries(entries)
    }

    /// Write the index to storage.
    pub fn store(&self, storage: &(impl StorageWrite + ?Sized), name: &str) -> Result<()> {
        let mut appender = storage.create_append(name)?;
        for &(tuple, offset) in &self.entries {
            wire::write_u64(&mut appender, tuple)?;
            wire::write_u64(&mut appender, offset)?;
        }
        appender.finish()
    }
}

/// Accumulates checkpoints during a write, sealed with the sentinel at
/// `finish()`.
#[derive(Debug, Default)]
pub struct PositionIndexBuilder {
    entries: Vec<(u64, u64)>,
}

impl PositionIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a checkpoint. Writers call this at run/block/interval
    /// boundaries with strictly increasing positions.
    pub fn add_checkpoint(&mut self, tuple: u64, byte_offset: u64) {
        debug_assert!(
            self.entries
                .last()
                .map_or(tuple == 0 && byte_offset == 0, |&(t, b)| tuple > t
                    && byte_offset > b),
            "checkpoint ({}, {}) not strictly after {:?}",
            tuple,
            byte_offset,
            self.entries.last()
        );
        self.entries.push((tuple, byte_offset));
    }

    /// Number of checkpoints recorded so far (no sentinel).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Seal with the sentinel and validate.
    pub fn finish(mut self, total_tuples: u64, total_bytes: u64) -> Result<PositionIndex> {
        if self.entries.is_empty() {
            self.entries.push((0, 0));
        }
        // An empty file's sole (0, 0) entry doubles as its sentinel.
        if *self.entries.last().unwrap() != (total_tuples, total_bytes) {
            self.entries.push((total_tuples, total_bytes));
        }
        PositionIndex::from_entries(self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lamina_core::storage::MemoryStorage;

    fn build(checkpoints: &[(u64, u64)], total: (u64, u64)) -> PositionIndex {
        let mut b = PositionIndexBuilder::new();
        for &(t, o) in checkpoints {
            b.add_checkpoint(t, o);
        }
        b.finish(total.0, total.1).unwrap()
    }

    #[test]
    fn test_floor_search() {
        let idx = build(&[(0, 0), (100, 400), (200, 800)], (250, 1000));
        assert_eq!(idx.search_position(0), (0, 0));
        assert_eq!(idx.search_position(99), (0, 0));
        assert_eq!(idx.search_position(100), (100, 400));
        assert_eq!(idx.search_position(150), (100, 400));
        assert_eq!(idx.search_position(249), (200, 800));
        // At or past the end: the sentinel
        assert_eq!(idx.search_position(250), (250, 1000));
        assert_eq!(idx.search_position(9999), (250, 1000));
    }

    #[test]
    fn test_totals_from_sentinel() {
        let idx = build(&[(0, 0), (10, 40)], (17, 68));
        assert_eq!(idx.total_tuples(), 17);
        assert_eq!(idx.total_bytes(), 68);
        assert_eq!(idx.len(), 3);
    }

    #[test]
    fn test_empty_file_single_entry() {
        let idx = PositionIndexBuilder::new().finish(0, 0).unwrap();
        assert_eq!(idx.entries(), &[(0, 0)]);
        assert_eq!(idx.total_tuples(), 0);
        assert_eq!(idx.search_position(0), (0, 0));
    }

    #[test]
    fn test_store_load_round_trip() {
        let storage = MemoryStorage::new();
        let idx = build(&[(0, 0), (128, 512)], (200, 800));
        idx.store(&storage, "col.pos").unwrap();

        // Flat pairs, no header: 3 entries × 16 bytes
        assert_eq!(storage.size("col.pos").unwrap(), 48);

        let loaded = PositionIndex::load(&storage, "col.pos").unwrap();
        assert_eq!(loaded, idx);
    }

    #[test]
    fn test_load_rejects_non_increasing() {
        let storage = MemoryStorage::new();
        let mut a = storage.create_append("bad.pos").unwrap();
        for &(t, o) in &[(0u64, 0u64), (50, 100), (50, 200)] {
            use std::io::Write;
            a.write_all(&t.to_be_bytes()).unwrap();
            a.write_all(&o.to_be_bytes()).unwrap();
        }
        a.finish().unwrap();
        let err = PositionIndex::load(&storage, "bad.pos").unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)), "got {:?}", err);
    }

    #[test]
    fn test_load_rejects_bad_first_entry() {
        let err = PositionIndex::from_entries(vec![(5, 0), (10, 10)]).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn test_load_rejects_ragged_size() {
        let storage = MemoryStorage::new();
        let mut a = storage.create_append("ragged.pos").unwrap();
        use std::io::Write;
        a.write_all(&[0u8; 20]).unwrap();
        a.finish().unwrap();
        let err = PositionIndex::load(&storage, "ragged.pos").unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }
}
