//! Column file codec for the lamina table store.
//!
//! This crate owns the per-column on-disk formats and their reader/writer
//! runtime: the value-trait abstraction over the supported column types,
//! the sparse position/value indexes, the order-preserving dictionary, the
//! four compression-scheme families (plain, run-length, dictionary, block),
//! the column file bundle that composes them, and the tuple-buffer batch
//! pipeline that fans row input out into per-column batched writes.
//!
//! Files are strictly write-once: a writer owns its file set exclusively
//! from creation to `finish()`, after which the set is immutable and safe
//! for any number of independent readers.

pub mod buffer;
pub mod bundle;
pub mod dict;
pub mod index;
pub mod scheme;
pub mod value;

// ── Bundle & orchestration ───────────────────────────────────────────────────
pub use bundle::{
    AnyColumnReader, AnyColumnWriter, ColumnFileBundle, ColumnFileStats, FileSetNames,
    WriterOptions,
};
pub use buffer::{CellValue, TupleBuffer};

// ── Value traits ─────────────────────────────────────────────────────────────
pub use value::{
    binary_search, count_distinct, extract_runs, expand_runs, merge_dictionaries, ColumnValue,
    ValueRun,
};

// ── Dictionary & indexes ─────────────────────────────────────────────────────
pub use dict::OrderedDictionary;
pub use index::{PositionIndex, ValueIndex};

// ── Typed reader/writer layer ────────────────────────────────────────────────
pub use scheme::{ColumnReader, ColumnWriter, TypedReader, TypedWriter};
