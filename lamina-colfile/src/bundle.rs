//! Column file bundle: the physical file set for one column, the
//! exhaustive `(column type × compression × sortedness)` dispatch to a
//! concrete reader/writer, and the statistics recorded at write-finish
//! time for catalog bookkeeping.
//!
//! The bundle owns no algorithmic logic: it names files, selects
//! families, validates file-set shape, and aggregates statistics.
//!
//! ## File set (one filename stem, fixed suffixes)
//!
//! ```text
//! <stem>.dat   data               always
//! <stem>.dic   dictionary         iff Dictionary
//! <stem>.pos   position index     iff RunLength/Block, or None + var-length
//! <stem>.vdx   value index        iff sort column
//! <stem>.tmp   provisional codes  transient, Dictionary write path only
//! <stem>.meta  JSON metadata      written at assemble() for the catalog
//! ```

use crate::buffer::CellValue;
use crate::index::CHECKPOINT_INTERVAL;
use crate::scheme::block::DEFAULT_BLOCK_SIZE_BYTES;
use crate::scheme::{ColumnReader, ColumnWriter, TypedReader, TypedWriter};
use lamina_core::error::{Error, Result};
use lamina_core::storage::Storage;
use lamina_core::types::{ColumnType, CompressionType};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;

// ============================================================================
// Names & options
// ============================================================================

/// The filename stem of one column's file set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSetNames {
    stem: String,
}

impl FileSetNames {
    pub fn new(stem: impl Into<String>) -> Self {
        Self { stem: stem.into() }
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn data(&self) -> String {
        format!("{}.dat", self.stem)
    }

    pub fn dictionary(&self) -> String {
        format!("{}.dic", self.stem)
    }

    pub fn position(&self) -> String {
        format!("{}.pos", self.stem)
    }

    pub fn value_index(&self) -> String {
        format!("{}.vdx", self.stem)
    }

    pub fn temp(&self) -> String {
        format!("{}.tmp", self.stem)
    }

    pub fn metadata(&self) -> String {
        format!("{}.meta", self.stem)
    }
}

/// Tunables for the write path.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Target pre-compression bytes per block (block family).
    pub block_size_bytes: usize,
    /// Tuples between value-index samples (sort columns).
    pub value_index_interval: u64,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            block_size_bytes: DEFAULT_BLOCK_SIZE_BYTES,
            value_index_interval: CHECKPOINT_INTERVAL,
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Summary statistics of a finished column file, recorded at `finish()`
/// and persisted by the external catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFileStats {
    /// Total tuples in the file.
    pub tuple_count: u64,
    /// Distinct values (dictionary files only).
    pub distinct_values: Option<u64>,
    /// Run count (run-length files only).
    pub run_count: Option<u64>,
    /// Code width in bytes (dictionary files only).
    pub dictionary_bytes_per_entry: Option<u8>,
    /// Whether the file is sorted by its own value (carries a value index).
    pub sorted: bool,
    /// xxh3-64 of the data file bytes.
    pub checksum: u64,
    /// Pre-compression size, kilobytes rounded up.
    pub uncompressed_size_kb: u64,
}

/// Sidecar metadata persisted alongside the file set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ColumnFileMeta {
    column_type: ColumnType,
    compression: CompressionType,
    stats: ColumnFileStats,
}

// ============================================================================
// Type-erased writer
// ============================================================================

macro_rules! with_variant {
    ($value:expr, $inner:ident => $body:expr) => {
        match $value {
            Self::Int8($inner) => $body,
            Self::Int16($inner) => $body,
            Self::Int32($inner) => $body,
            Self::Int64($inner) => $body,
            Self::Float32($inner) => $body,
            Self::Float64($inner) => $body,
            Self::VarChar($inner) => $body,
            Self::VarBinary($inner) => $body,
        }
    };
}

/// A [`ColumnWriter`] dispatched by physical value kind, for callers (the
/// tuple buffer, the import pipeline) that hold heterogeneous columns.
pub enum AnyColumnWriter {
    Int8(ColumnWriter<i8>),
    Int16(ColumnWriter<i16>),
    Int32(ColumnWriter<i32>),
    Int64(ColumnWriter<i64>),
    Float32(ColumnWriter<f32>),
    Float64(ColumnWriter<f64>),
    VarChar(ColumnWriter<String>),
    VarBinary(ColumnWriter<Vec<u8>>),
}

impl AnyColumnWriter {
    /// Create a writer for a fresh file set, dispatching on the declared
    /// column type's storage kind.
    pub fn create(
        storage: Arc<dyn Storage>,
        names: &FileSetNames,
        column_type: ColumnType,
        compression: CompressionType,
        sorted: bool,
        options: &WriterOptions,
    ) -> Result<Self> {
        Ok(match column_type.storage_type() {
            ColumnType::Int8 => {
                Self::Int8(ColumnWriter::create(storage, names, compression, sorted, options)?)
            }
            ColumnType::Int16 => {
                Self::Int16(ColumnWriter::create(storage, names, compression, sorted, options)?)
            }
            ColumnType::Int32 => {
                Self::Int32(ColumnWriter::create(storage, names, compression, sorted, options)?)
            }
            ColumnType::Int64 => {
                Self::Int64(ColumnWriter::create(storage, names, compression, sorted, options)?)
            }
            ColumnType::Float32 => {
                Self::Float32(ColumnWriter::create(storage, names, compression, sorted, options)?)
            }
            ColumnType::Float64 => {
                Self::Float64(ColumnWriter::create(storage, names, compression, sorted, options)?)
            }
            ColumnType::VarChar => {
                Self::VarChar(ColumnWriter::create(storage, names, compression, sorted, options)?)
            }
            ColumnType::VarBinary => Self::VarBinary(ColumnWriter::create(
                storage, names, compression, sorted, options,
            )?),
            // storage_type never returns a temporal kind
            ColumnType::Date | ColumnType::Time | ColumnType::Timestamp => unreachable!(),
        })
    }

    /// Tuples written so far.
    pub fn tuple_count(&self) -> u64 {
        with_variant!(self, w => w.tuple_count())
    }

    /// Seal the file set and return its statistics.
    pub fn finish(&mut self) -> Result<ColumnFileStats> {
        with_variant!(self, w => w.finish())
    }
}

// ============================================================================
// Type-erased reader
// ============================================================================

/// A [`ColumnReader`] dispatched by physical value kind.
pub enum AnyColumnReader {
    Int8(ColumnReader<i8>),
    Int16(ColumnReader<i16>),
    Int32(ColumnReader<i32>),
    Int64(ColumnReader<i64>),
    Float32(ColumnReader<f32>),
    Float64(ColumnReader<f64>),
    VarChar(ColumnReader<String>),
    VarBinary(ColumnReader<Vec<u8>>),
}

impl AnyColumnReader {
    /// Open a reader over a finished file set.
    pub fn open(
        storage: Arc<dyn Storage>,
        names: &FileSetNames,
        column_type: ColumnType,
        compression: CompressionType,
        sorted: bool,
    ) -> Result<Self> {
        Ok(match column_type.storage_type() {
            ColumnType::Int8 => Self::Int8(ColumnReader::open(storage, names, compression, sorted)?),
            ColumnType::Int16 => {
                Self::Int16(ColumnReader::open(storage, names, compression, sorted)?)
            }
            ColumnType::Int32 => {
                Self::Int32(ColumnReader::open(storage, names, compression, sorted)?)
            }
            ColumnType::Int64 => {
                Self::Int64(ColumnReader::open(storage, names, compression, sorted)?)
            }
            ColumnType::Float32 => {
                Self::Float32(ColumnReader::open(storage, names, compression, sorted)?)
            }
            ColumnType::Float64 => {
                Self::Float64(ColumnReader::open(storage, names, compression, sorted)?)
            }
            ColumnType::VarChar => {
                Self::VarChar(ColumnReader::open(storage, names, compression, sorted)?)
            }
            ColumnType::VarBinary => {
                Self::VarBinary(ColumnReader::open(storage, names, compression, sorted)?)
            }
            ColumnType::Date | ColumnType::Time | ColumnType::Timestamp => unreachable!(),
        })
    }

    pub fn total_tuples(&self) -> u64 {
        with_variant!(self, r => r.total_tuples())
    }

    pub fn current_tuple(&self) -> u64 {
        with_variant!(self, r => r.current_tuple())
    }

    pub fn seek_to_tuple(&mut self, tuple: u64) -> Result<()> {
        with_variant!(self, r => r.seek_to_tuple(tuple))
    }

    pub fn skip_values(&mut self, n: u64) -> Result<()> {
        with_variant!(self, r => r.skip_values(n))
    }

    /// Boxed row-seam read (slow path): up to `max` cells from the
    /// current position. Batch consumers should match the typed variant
    /// instead.
    pub fn read_cells(&mut self, max: usize) -> Result<Vec<CellValue>> {
        macro_rules! drain {
            ($reader:expr, $variant:ident, $default:expr) => {{
                let mut buf = vec![$default; max];
                let n = $reader.read_values(&mut buf)?;
                buf.truncate(n);
                buf.into_iter().map(CellValue::$variant).collect()
            }};
        }
        Ok(match self {
            Self::Int8(r) => drain!(r, Int8, 0i8),
            Self::Int16(r) => drain!(r, Int16, 0i16),
            Self::Int32(r) => drain!(r, Int32, 0i32),
            Self::Int64(r) => drain!(r, Int64, 0i64),
            Self::Float32(r) => drain!(r, Float32, 0f32),
            Self::Float64(r) => drain!(r, Float64, 0f64),
            Self::VarChar(r) => drain!(r, VarChar, String::new()),
            Self::VarBinary(r) => drain!(r, VarBinary, Vec::new()),
        })
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// The file set of one finished column, with its declared types and
/// statistics. Constructed from a finished writer (write path) or an
/// existing persisted file set (read path); immutable either way.
#[derive(Debug, Clone)]
pub struct ColumnFileBundle {
    storage: Arc<dyn Storage>,
    names: FileSetNames,
    column_type: ColumnType,
    compression: CompressionType,
    stats: ColumnFileStats,
}

impl ColumnFileBundle {
    /// Create a writer for a fresh file set under `stem`.
    ///
    /// Pass the returned stats to [`assemble`](Self::assemble) after
    /// `finish()`.
    pub fn create_writer(
        storage: Arc<dyn Storage>,
        stem: &str,
        column_type: ColumnType,
        compression: CompressionType,
        sorted: bool,
        options: &WriterOptions,
    ) -> Result<AnyColumnWriter> {
        AnyColumnWriter::create(
            storage,
            &FileSetNames::new(stem),
            column_type,
            compression,
            sorted,
            options,
        )
    }

    /// Write path: assemble a bundle from a finished writer's statistics,
    /// validating the file-set shape and persisting the metadata sidecar.
    pub fn assemble(
        storage: Arc<dyn Storage>,
        stem: &str,
        column_type: ColumnType,
        compression: CompressionType,
        stats: ColumnFileStats,
    ) -> Result<Self> {
        let names = FileSetNames::new(stem);
        Self::validate_file_set(&*storage, &names, column_type, compression, &stats)?;

        let meta = ColumnFileMeta {
            column_type,
            compression,
            stats: stats.clone(),
        };
        let mut appender = storage.create_append(&names.metadata())?;
        appender.write_all(&serde_json::to_vec(&meta).map_err(|e| {
            Error::corrupt(format!("metadata encode failed: {}", e))
        })?)?;
        appender.finish()?;

        tracing::info!(
            stem,
            tuples = stats.tuple_count,
            ?column_type,
            ?compression,
            sorted = stats.sorted,
            "column file bundle assembled"
        );
        Ok(Self {
            storage,
            names,
            column_type,
            compression,
            stats,
        })
    }

    /// Read path: open a bundle from its persisted metadata sidecar.
    pub fn open(storage: Arc<dyn Storage>, stem: &str) -> Result<Self> {
        let names = FileSetNames::new(stem);
        let raw = storage.read_all(&names.metadata())?;
        let meta: ColumnFileMeta = serde_json::from_slice(&raw)
            .map_err(|e| Error::corrupt(format!("metadata decode failed: {}", e)))?;
        Self::validate_file_set(&*storage, &names, meta.column_type, meta.compression, &meta.stats)?;
        Ok(Self {
            storage,
            names,
            column_type: meta.column_type,
            compression: meta.compression,
            stats: meta.stats,
        })
    }

    /// File-set shape rules: which suffixes must (and must not) exist.
    fn validate_file_set(
        storage: &dyn Storage,
        names: &FileSetNames,
        column_type: ColumnType,
        compression: CompressionType,
        stats: &ColumnFileStats,
    ) -> Result<()> {
        let mut required = vec![names.data()];
        if compression.needs_dictionary_file() {
            required.push(names.dictionary());
        }
        if compression.needs_position_file(column_type) {
            required.push(names.position());
        }
        if stats.sorted {
            required.push(names.value_index());
        }
        for name in required {
            if !storage.exists(&name)? {
                return Err(Error::not_found(format!(
                    "bundle file missing: {}",
                    name
                )));
            }
        }
        if storage.exists(&names.temp())? {
            return Err(Error::corrupt(format!(
                "stale temp file in finished bundle: {}",
                names.temp()
            )));
        }
        Ok(())
    }

    /// Open a reader over this bundle.
    pub fn open_reader(&self) -> Result<AnyColumnReader> {
        AnyColumnReader::open(
            Arc::clone(&self.storage),
            &self.names,
            self.column_type,
            self.compression,
            self.stats.sorted,
        )
    }

    pub fn names(&self) -> &FileSetNames {
        &self.names
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn compression(&self) -> CompressionType {
        self.compression
    }

    pub fn sorted(&self) -> bool {
        self.stats.sorted
    }

    pub fn stats(&self) -> &ColumnFileStats {
        &self.stats
    }
}
