//! Sparse indexes for seek-then-scan random access.
//!
//! Both index kinds are small enough to flush and load wholly (a handful
//! of checkpoints per run/block/interval, typically well under a
//! megabyte), so neither file carries a header: the position index ends in
//! a sentinel pair that doubles as the total tuple/byte counts, and the
//! value index is just its records.

mod position;
mod value_index;

pub use position::{PositionIndex, PositionIndexBuilder};
pub use value_index::{ValueIndex, ValueIndexBuilder};

/// Tuples between checkpoints for plain variable-length files and for the
/// value index sampling of sort columns.
pub const CHECKPOINT_INTERVAL: u64 = 128;
