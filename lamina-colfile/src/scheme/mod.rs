//! Compression-scheme reader/writer families and their dispatch layer.
//!
//! Every family implements the same contract ([`TypedWriter`] /
//! [`TypedReader`]); [`ColumnWriter`] and [`ColumnReader`] are the closed,
//! exhaustively-matched dispatch over `(value kind × compression ×
//! sortedness)` chosen once at file-open time — batch paths never pay
//! per-value dynamic dispatch.
//!
//! ## Writer lifecycle
//!
//! `Open` (accepting writes) → `finish()` (footer/index/dictionary flush,
//! statistics) → `Finished`. Writing after `finish()` is a usage error.
//! A writer owns its file set exclusively; discarding one without calling
//! `finish()` leaves partial files that are corrupt by definition.

pub mod block;
pub mod dictionary;
pub mod plain;
pub mod rle;

pub use block::{BlockReader, BlockWriter};
pub use dictionary::{DictionaryCodeReader, DictionaryReader, DictionaryWriter};
pub use plain::{PlainFixedReader, PlainFixedWriter, PlainVariableReader, PlainVariableWriter};
pub use rle::{RleReader, RleWriter};

use crate::bundle::{ColumnFileStats, FileSetNames, WriterOptions};
use crate::index::{ValueIndex, ValueIndexBuilder};
use crate::value::ColumnValue;
use lamina_core::error::{Error, Result};
use lamina_core::storage::{Storage, StorageAppender};
use lamina_core::types::CompressionType;
use once_cell::sync::OnceCell;
use std::cmp::Ordering;
use std::io::{self, Write};
use std::sync::Arc;
use xxhash_rust::xxh3::Xxh3;

// ============================================================================
// Contracts
// ============================================================================

/// Write side of a compression family.
pub trait TypedWriter<T: ColumnValue> {
    /// Append a batch of values (fast path).
    fn write_values(&mut self, values: &[T]) -> Result<()>;

    /// Append one value (slow path).
    fn write_value(&mut self, value: &T) -> Result<()> {
        self.write_values(std::slice::from_ref(value))
    }

    /// Tuples written so far.
    fn tuple_count(&self) -> u64;

    /// Flush footer/index/dictionary files, record statistics, and seal
    /// the file set. Exactly once.
    fn finish(&mut self) -> Result<ColumnFileStats>;
}

/// Read side of a compression family.
pub trait TypedReader<T: ColumnValue> {
    /// Fill `out` from the current position; returns the count read,
    /// short only at end of file.
    fn read_values(&mut self, out: &mut [T]) -> Result<usize>;

    /// Read one value (slow path).
    fn read_value(&mut self) -> Result<T> {
        let mut buf = [T::default()];
        if self.read_values(&mut buf)? == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of column file",
            )));
        }
        let [v] = buf;
        Ok(v)
    }

    /// Skip forward `n` tuples.
    fn skip_values(&mut self, n: u64) -> Result<()>;

    /// Position at an absolute tuple number.
    fn seek_to_tuple(&mut self, tuple: u64) -> Result<()>;

    /// Total tuples in the file.
    fn total_tuples(&self) -> u64;

    /// Tuple number of the next value to be read.
    fn current_tuple(&self) -> u64;
}

// ============================================================================
// Shared writer plumbing
// ============================================================================

/// Writer lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriterState {
    Open,
    Finished,
}

impl WriterState {
    /// Fail fast on writes (or a second finish) after `finish()`.
    pub(crate) fn ensure_open(self) -> Result<()> {
        match self {
            WriterState::Open => Ok(()),
            WriterState::Finished => Err(Error::usage(
                "column writer already finished; file sets are write-once",
            )),
        }
    }
}

/// Appender wrapper that maintains the running xxh3 checksum and byte
/// count of the data file as it is written.
pub(crate) struct DataSink {
    inner: Box<dyn StorageAppender>,
    hasher: Xxh3,
    bytes: u64,
}

impl DataSink {
    pub(crate) fn new(inner: Box<dyn StorageAppender>) -> Self {
        Self {
            inner,
            hasher: Xxh3::new(),
            bytes: 0,
        }
    }

    /// Bytes written to the data file so far.
    pub(crate) fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Flush and return `(checksum, total_bytes)`.
    pub(crate) fn finish(&mut self) -> Result<(u64, u64)> {
        self.inner.finish()?;
        Ok((self.hasher.digest(), self.bytes))
    }
}

impl Write for DataSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Kilobytes (rounded up) for the uncompressed-size statistic.
pub(crate) fn size_kb(bytes: u64) -> u64 {
    bytes.div_ceil(1024)
}

// ============================================================================
// ColumnWriter: family dispatch + sort-column value index
// ============================================================================

enum FamilyWriter<T: ColumnValue> {
    PlainFixed(PlainFixedWriter<T>),
    PlainVariable(PlainVariableWriter<T>),
    RunLength(RleWriter<T>),
    Dictionary(DictionaryWriter<T>),
    Block(BlockWriter<T>),
}

struct SortTracking<T: ColumnValue> {
    builder: ValueIndexBuilder<T>,
    last_value: Option<T>,
    interval: u64,
}

/// Typed column writer: one compression family plus, for sort columns,
/// value-index maintenance over the values flowing through.
pub struct ColumnWriter<T: ColumnValue> {
    family: FamilyWriter<T>,
    sort: Option<SortTracking<T>>,
    storage: Arc<dyn Storage>,
    value_index_name: String,
}

impl<T: ColumnValue> ColumnWriter<T> {
    /// Create a writer for a fresh file set.
    ///
    /// The compression type is dispatched exhaustively; `NullSuppress`
    /// lands in the plain family, and plain picks fixed or
    /// variable-length from the value kind.
    pub fn create(
        storage: Arc<dyn Storage>,
        names: &FileSetNames,
        compression: CompressionType,
        sorted: bool,
        options: &WriterOptions,
    ) -> Result<Self> {
        let family = match compression.effective() {
            CompressionType::None => {
                if T::FIXED_BITS.is_some() {
                    FamilyWriter::PlainFixed(PlainFixedWriter::create(&*storage, names)?)
                } else {
                    FamilyWriter::PlainVariable(PlainVariableWriter::create(
                        Arc::clone(&storage),
                        names,
                    )?)
                }
            }
            CompressionType::RunLength => {
                FamilyWriter::RunLength(RleWriter::create(Arc::clone(&storage), names)?)
            }
            CompressionType::Dictionary => {
                FamilyWriter::Dictionary(DictionaryWriter::create(Arc::clone(&storage), names)?)
            }
            CompressionType::BlockGzip | CompressionType::BlockSnappy
            | CompressionType::BlockZstd => FamilyWriter::Block(BlockWriter::create(
                Arc::clone(&storage),
                names,
                compression,
                options.block_size_bytes,
            )?),
            CompressionType::NullSuppress => unreachable!(),
        };
        Ok(Self {
            family,
            sort: sorted.then(|| SortTracking {
                builder: ValueIndexBuilder::new(),
                last_value: None,
                interval: options.value_index_interval.max(1),
            }),
            storage,
            value_index_name: names.value_index(),
        })
    }

    /// Track sort order and sample value-index checkpoints for a batch
    /// beginning at tuple `start_tuple`.
    fn observe_sorted(&mut self, values: &[T], start_tuple: u64) -> Result<()> {
        let Some(sort) = &mut self.sort else {
            return Ok(());
        };
        for (i, v) in values.iter().enumerate() {
            if let Some(last) = &sort.last_value {
                if v.total_cmp(last) == Ordering::Less {
                    return Err(Error::usage(
                        "sort column written out of order",
                    ));
                }
            }
            let tuple = start_tuple + i as u64;
            if tuple % sort.interval == 0 {
                sort.builder.observe(v, tuple);
            }
            sort.last_value = Some(v.clone());
        }
        Ok(())
    }
}

impl<T: ColumnValue> TypedWriter<T> for ColumnWriter<T> {
    fn write_values(&mut self, values: &[T]) -> Result<()> {
        let start_tuple = self.tuple_count();
        self.observe_sorted(values, start_tuple)?;
        match &mut self.family {
            FamilyWriter::PlainFixed(w) => w.write_values(values),
            FamilyWriter::PlainVariable(w) => w.write_values(values),
            FamilyWriter::RunLength(w) => w.write_values(values),
            FamilyWriter::Dictionary(w) => w.write_values(values),
            FamilyWriter::Block(w) => w.write_values(values),
        }
    }

    fn tuple_count(&self) -> u64 {
        match &self.family {
            FamilyWriter::PlainFixed(w) => w.tuple_count(),
            FamilyWriter::PlainVariable(w) => w.tuple_count(),
            FamilyWriter::RunLength(w) => w.tuple_count(),
            FamilyWriter::Dictionary(w) => w.tuple_count(),
            FamilyWriter::Block(w) => w.tuple_count(),
        }
    }

    fn finish(&mut self) -> Result<ColumnFileStats> {
        let tuple_count = self.tuple_count();
        let mut stats = match &mut self.family {
            FamilyWriter::PlainFixed(w) => w.finish()?,
            FamilyWriter::PlainVariable(w) => w.finish()?,
            FamilyWriter::RunLength(w) => w.finish()?,
            FamilyWriter::Dictionary(w) => w.finish()?,
            FamilyWriter::Block(w) => w.finish()?,
        };
        if let Some(mut sort) = self.sort.take() {
            // Seal the index with the final tuple's value so the file's
            // maximum is always recorded.
            if let (Some(last), Some(final_tuple)) =
                (sort.last_value.take(), tuple_count.checked_sub(1))
            {
                sort.builder.observe(&last, final_tuple);
            }
            let index = sort.builder.finish()?;
            index.store(&*self.storage, &self.value_index_name)?;
            stats.sorted = true;
        }
        Ok(stats)
    }
}

// ============================================================================
// ColumnReader: family dispatch + value-based seek
// ============================================================================

enum FamilyReader<T: ColumnValue> {
    PlainFixed(PlainFixedReader<T>),
    PlainVariable(PlainVariableReader<T>),
    RunLength(RleReader<T>),
    Dictionary(DictionaryReader<T>),
    Block(BlockReader<T>),
}

/// Typed column reader: one compression family plus, for sort columns, a
/// lazily loaded value index for value-based seeks.
pub struct ColumnReader<T: ColumnValue> {
    family: FamilyReader<T>,
    sorted: bool,
    storage: Arc<dyn Storage>,
    value_index_name: String,
    value_index: OnceCell<ValueIndex<T>>,
}

impl<T: ColumnValue> ColumnReader<T> {
    /// Open a reader over a finished file set.
    pub fn open(
        storage: Arc<dyn Storage>,
        names: &FileSetNames,
        compression: CompressionType,
        sorted: bool,
    ) -> Result<Self> {
        let family = match compression.effective() {
            CompressionType::None => {
                if T::FIXED_BITS.is_some() {
                    FamilyReader::PlainFixed(PlainFixedReader::open(&*storage, names)?)
                } else {
                    FamilyReader::PlainVariable(PlainVariableReader::open(&*storage, names)?)
                }
            }
            CompressionType::RunLength => {
                FamilyReader::RunLength(RleReader::open(&*storage, names)?)
            }
            CompressionType::Dictionary => {
                FamilyReader::Dictionary(DictionaryReader::open(Arc::clone(&storage), names)?)
            }
            CompressionType::BlockGzip | CompressionType::BlockSnappy
            | CompressionType::BlockZstd => {
                FamilyReader::Block(BlockReader::open(&*storage, names, compression)?)
            }
            CompressionType::NullSuppress => unreachable!(),
        };
        Ok(Self {
            family,
            sorted,
            storage,
            value_index_name: names.value_index(),
            value_index: OnceCell::new(),
        })
    }

    /// Seek to the scan start for `value` via the value index.
    ///
    /// Returns the tuple positioned at, or `None` (position unchanged)
    /// when `value` lies outside the file's value range. Usage error on a
    /// column not sorted by its own value.
    pub fn seek_to_value(&mut self, value: &T) -> Result<Option<u64>> {
        if !self.sorted {
            return Err(Error::usage(
                "value seek on a column not sorted by value",
            ));
        }
        let start = {
            let index = self.value_index.get_or_try_init(|| {
                ValueIndex::load(&*self.storage, &self.value_index_name)
            })?;
            index.search_value(value)
        };
        match start {
            Some(tuple) => {
                self.seek_to_tuple(tuple)?;
                Ok(Some(tuple))
            }
            None => Ok(None),
        }
    }

    /// Run-level accessor for in-situ processing of run-length files.
    ///
    /// Usage error on any other family.
    pub fn as_run_length(&mut self) -> Result<&mut RleReader<T>> {
        match &mut self.family {
            FamilyReader::RunLength(r) => Ok(r),
            _ => Err(Error::usage(
                "run accessor on a column that is not run-length encoded",
            )),
        }
    }

    /// Dictionary accessor (decoded values, raw codes, dictionary table).
    ///
    /// Usage error on any other family.
    pub fn as_dictionary(&mut self) -> Result<&mut DictionaryReader<T>> {
        match &mut self.family {
            FamilyReader::Dictionary(r) => Ok(r),
            _ => Err(Error::usage(
                "dictionary accessor on a column that is not dictionary encoded",
            )),
        }
    }
}

impl<T: ColumnValue> TypedReader<T> for ColumnReader<T> {
    fn read_values(&mut self, out: &mut [T]) -> Result<usize> {
        match &mut self.family {
            FamilyReader::PlainFixed(r) => r.read_values(out),
            FamilyReader::PlainVariable(r) => r.read_values(out),
            FamilyReader::RunLength(r) => r.read_values(out),
            FamilyReader::Dictionary(r) => r.read_values(out),
            FamilyReader::Block(r) => r.read_values(out),
        }
    }

    fn skip_values(&mut self, n: u64) -> Result<()> {
        match &mut self.family {
            FamilyReader::PlainFixed(r) => r.skip_values(n),
            FamilyReader::PlainVariable(r) => r.skip_values(n),
            FamilyReader::RunLength(r) => r.skip_values(n),
            FamilyReader::Dictionary(r) => r.skip_values(n),
            FamilyReader::Block(r) => r.skip_values(n),
        }
    }

    fn seek_to_tuple(&mut self, tuple: u64) -> Result<()> {
        match &mut self.family {
            FamilyReader::PlainFixed(r) => r.seek_to_tuple(tuple),
            FamilyReader::PlainVariable(r) => r.seek_to_tuple(tuple),
            FamilyReader::RunLength(r) => r.seek_to_tuple(tuple),
            FamilyReader::Dictionary(r) => r.seek_to_tuple(tuple),
            FamilyReader::Block(r) => r.seek_to_tuple(tuple),
        }
    }

    fn total_tuples(&self) -> u64 {
        match &self.family {
            FamilyReader::PlainFixed(r) => r.total_tuples(),
            FamilyReader::PlainVariable(r) => r.total_tuples(),
            FamilyReader::RunLength(r) => r.total_tuples(),
            FamilyReader::Dictionary(r) => r.total_tuples(),
            FamilyReader::Block(r) => r.total_tuples(),
        }
    }

    fn current_tuple(&self) -> u64 {
        match &self.family {
            FamilyReader::PlainFixed(r) => r.current_tuple(),
            FamilyReader::PlainVariable(r) => r.current_tuple(),
            FamilyReader::RunLength(r) => r.current_tuple(),
            FamilyReader::Dictionary(r) => r.current_tuple(),
            FamilyReader::Block(r) => r.current_tuple(),
        }
    }
}
