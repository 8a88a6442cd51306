//! Plain (uncompressed) column files.
//!
//! ## Fixed-width
//!
//! ```text
//! values: contiguous big-endian values, bits_per_value/8 bytes each
//! ```
//!
//! Tuple `t` lives at byte `t × width`, so random seek is O(1) arithmetic
//! and no position file is written.
//!
//! ## Variable-length
//!
//! ```text
//! records: contiguous length-prefixed values
//! ```
//!
//! Random seek takes the position file: floor-search the checkpoint list
//! (one checkpoint every [`CHECKPOINT_INTERVAL`] tuples), then scan
//! forward record by record.

use super::{size_kb, DataSink, TypedReader, TypedWriter, WriterState};
use crate::bundle::{ColumnFileStats, FileSetNames};
use crate::index::{PositionIndex, PositionIndexBuilder, CHECKPOINT_INTERVAL};
use crate::value::ColumnValue;
use lamina_core::error::{Error, Result};
use lamina_core::storage::{Storage, StorageReader};
use lamina_core::wire;
use std::io::{BufReader, Seek, SeekFrom};
use std::marker::PhantomData;
use std::sync::Arc;

/// Encoded width in bytes for a fixed-width value kind.
fn fixed_width<T: ColumnValue>() -> Result<u64> {
    match T::FIXED_BITS {
        Some(bits) => Ok((bits / 8) as u64),
        None => Err(Error::usage(
            "fixed-width codec over a variable-length value kind",
        )),
    }
}

// ============================================================================
// Fixed-width writer / reader
// ============================================================================

/// Plain writer for fixed-width kinds: direct pass-through to the raw
/// codec.
pub struct PlainFixedWriter<T: ColumnValue> {
    sink: DataSink,
    tuples: u64,
    state: WriterState,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ColumnValue> PlainFixedWriter<T> {
    pub fn create(storage: &dyn Storage, names: &FileSetNames) -> Result<Self> {
        fixed_width::<T>()?;
        Ok(Self {
            sink: DataSink::new(storage.create_append(&names.data())?),
            tuples: 0,
            state: WriterState::Open,
            _marker: PhantomData,
        })
    }
}

impl<T: ColumnValue> TypedWriter<T> for PlainFixedWriter<T> {
    fn write_values(&mut self, values: &[T]) -> Result<()> {
        self.state.ensure_open()?;
        T::write_slice(values, &mut self.sink)?;
        self.tuples += values.len() as u64;
        Ok(())
    }

    fn tuple_count(&self) -> u64 {
        self.tuples
    }

    fn finish(&mut self) -> Result<ColumnFileStats> {
        self.state.ensure_open()?;
        self.state = WriterState::Finished;
        let (checksum, bytes) = self.sink.finish()?;
        tracing::debug!(tuples = self.tuples, bytes, "plain fixed column finished");
        Ok(ColumnFileStats {
            tuple_count: self.tuples,
            checksum,
            uncompressed_size_kb: size_kb(bytes),
            ..ColumnFileStats::default()
        })
    }
}

/// Plain reader for fixed-width kinds: seeks by stride.
#[derive(Debug)]
pub struct PlainFixedReader<T: ColumnValue> {
    reader: BufReader<Box<dyn StorageReader>>,
    width: u64,
    total: u64,
    tuple: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ColumnValue> PlainFixedReader<T> {
    pub fn open(storage: &dyn Storage, names: &FileSetNames) -> Result<Self> {
        let width = fixed_width::<T>()?;
        let data_name = names.data();
        let size = storage.size(&data_name)?;
        if size % width != 0 {
            return Err(Error::corrupt(format!(
                "fixed-width data file size {} not a multiple of value width {}",
                size, width
            )));
        }
        Ok(Self {
            reader: BufReader::new(storage.open_read(&data_name)?),
            width,
            total: size / width,
            tuple: 0,
            _marker: PhantomData,
        })
    }
}

impl<T: ColumnValue> TypedReader<T> for PlainFixedReader<T> {
    fn read_values(&mut self, out: &mut [T]) -> Result<usize> {
        let n = (out.len() as u64).min(self.total - self.tuple) as usize;
        T::read_slice(&mut self.reader, &mut out[..n])?;
        self.tuple += n as u64;
        Ok(n)
    }

    fn skip_values(&mut self, n: u64) -> Result<()> {
        let target = self.tuple + n;
        self.seek_to_tuple(target)
    }

    fn seek_to_tuple(&mut self, tuple: u64) -> Result<()> {
        if tuple > self.total {
            return Err(Error::usage(format!(
                "seek to tuple {} past end of {}-tuple file",
                tuple, self.total
            )));
        }
        self.reader.seek(SeekFrom::Start(tuple * self.width))?;
        self.tuple = tuple;
        Ok(())
    }

    fn total_tuples(&self) -> u64 {
        self.total
    }

    fn current_tuple(&self) -> u64 {
        self.tuple
    }
}

// ============================================================================
// Variable-length writer / reader
// ============================================================================

/// Plain writer for variable-length kinds: length-prefixed records plus
/// interval checkpoints in the position file.
pub struct PlainVariableWriter<T: ColumnValue> {
    sink: DataSink,
    position: PositionIndexBuilder,
    tuples: u64,
    state: WriterState,
    storage: Arc<dyn Storage>,
    position_name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ColumnValue> PlainVariableWriter<T> {
    pub fn create(storage: Arc<dyn Storage>, names: &FileSetNames) -> Result<Self> {
        let sink = DataSink::new(storage.create_append(&names.data())?);
        Ok(Self {
            sink,
            position: PositionIndexBuilder::new(),
            tuples: 0,
            state: WriterState::Open,
            position_name: names.position(),
            storage,
            _marker: PhantomData,
        })
    }
}

impl<T: ColumnValue> TypedWriter<T> for PlainVariableWriter<T> {
    fn write_values(&mut self, values: &[T]) -> Result<()> {
        self.state.ensure_open()?;
        for v in values {
            if self.tuples % CHECKPOINT_INTERVAL == 0 {
                self.position
                    .add_checkpoint(self.tuples, self.sink.bytes_written());
            }
            v.write_to(&mut self.sink)?;
            self.tuples += 1;
        }
        Ok(())
    }

    fn tuple_count(&self) -> u64 {
        self.tuples
    }

    fn finish(&mut self) -> Result<ColumnFileStats> {
        self.state.ensure_open()?;
        self.state = WriterState::Finished;
        let (checksum, bytes) = self.sink.finish()?;
        let index = std::mem::take(&mut self.position).finish(self.tuples, bytes)?;
        index.store(&*self.storage, &self.position_name)?;
        tracing::debug!(
            tuples = self.tuples,
            bytes,
            checkpoints = index.len(),
            "plain variable-length column finished"
        );
        Ok(ColumnFileStats {
            tuple_count: self.tuples,
            checksum,
            uncompressed_size_kb: size_kb(bytes),
            ..ColumnFileStats::default()
        })
    }
}

/// Plain reader for variable-length kinds: checkpoint floor search, then
/// forward scan.
pub struct PlainVariableReader<T: ColumnValue> {
    reader: BufReader<Box<dyn StorageReader>>,
    position: PositionIndex,
    total: u64,
    tuple: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ColumnValue> PlainVariableReader<T> {
    pub fn open(storage: &dyn Storage, names: &FileSetNames) -> Result<Self> {
        let position = PositionIndex::load(storage, &names.position())?;
        Ok(Self {
            reader: BufReader::new(storage.open_read(&names.data())?),
            total: position.total_tuples(),
            position,
            tuple: 0,
            _marker: PhantomData,
        })
    }

    /// Skip one record without decoding its payload.
    fn skip_record(&mut self) -> Result<()> {
        let len = wire::read_len_header(&mut self.reader)?;
        self.reader.seek(SeekFrom::Current(len as i64))?;
        self.tuple += 1;
        Ok(())
    }
}

impl<T: ColumnValue> TypedReader<T> for PlainVariableReader<T> {
    fn read_values(&mut self, out: &mut [T]) -> Result<usize> {
        let n = (out.len() as u64).min(self.total - self.tuple) as usize;
        T::read_slice(&mut self.reader, &mut out[..n])?;
        self.tuple += n as u64;
        Ok(n)
    }

    fn skip_values(&mut self, n: u64) -> Result<()> {
        if self.tuple + n > self.total {
            return Err(Error::usage(format!(
                "skip past end of {}-tuple file",
                self.total
            )));
        }
        for _ in 0..n {
            self.skip_record()?;
        }
        Ok(())
    }

    fn seek_to_tuple(&mut self, tuple: u64) -> Result<()> {
        if tuple > self.total {
            return Err(Error::usage(format!(
                "seek to tuple {} past end of {}-tuple file",
                tuple, self.total
            )));
        }
        if tuple >= self.tuple {
            // Forward: scan from where we are.
            let ahead = tuple - self.tuple;
            for _ in 0..ahead {
                self.skip_record()?;
            }
            return Ok(());
        }
        // Backward: restart from the floor checkpoint.
        let (ck_tuple, ck_offset) = self.position.search_position(tuple);
        self.reader.seek(SeekFrom::Start(ck_offset))?;
        self.tuple = ck_tuple;
        for _ in 0..tuple - ck_tuple {
            self.skip_record()?;
        }
        Ok(())
    }

    fn total_tuples(&self) -> u64 {
        self.total
    }

    fn current_tuple(&self) -> u64 {
        self.tuple
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lamina_core::storage::MemoryStorage;

    fn setup() -> (Arc<dyn Storage>, FileSetNames) {
        (Arc::new(MemoryStorage::new()), FileSetNames::new("t/c0"))
    }

    #[test]
    fn test_fixed_round_trip_and_stride_seek() {
        let (storage, names) = setup();
        let values: Vec<i64> = (0..500).map(|i| i * 11 - 300).collect();

        let mut writer = PlainFixedWriter::<i64>::create(&*storage, &names).unwrap();
        writer.write_values(&values[..200]).unwrap();
        writer.write_values(&values[200..]).unwrap();
        let stats = writer.finish().unwrap();
        assert_eq!(stats.tuple_count, 500);
        assert_eq!(stats.uncompressed_size_kb, (500 * 8u64).div_ceil(1024));
        // No position file for plain fixed
        assert!(!storage.exists(&names.position()).unwrap());

        let mut reader = PlainFixedReader::<i64>::open(&*storage, &names).unwrap();
        assert_eq!(reader.total_tuples(), 500);
        let mut out = vec![0i64; 500];
        assert_eq!(reader.read_values(&mut out).unwrap(), 500);
        assert_eq!(out, values);
        // Past the end: zero values
        assert_eq!(reader.read_values(&mut out).unwrap(), 0);

        reader.seek_to_tuple(123).unwrap();
        assert_eq!(reader.read_value().unwrap(), values[123]);
        reader.skip_values(10).unwrap();
        assert_eq!(reader.read_value().unwrap(), values[134]);
    }

    #[test]
    fn test_variable_round_trip_and_checkpoint_seek() {
        let (storage, names) = setup();
        // Lengths straddling the checkpoint interval
        let values: Vec<String> = (0..400)
            .map(|i| "x".repeat(i % 37) + &i.to_string())
            .collect();

        let mut writer =
            PlainVariableWriter::<String>::create(Arc::clone(&storage), &names).unwrap();
        writer.write_values(&values).unwrap();
        let stats = writer.finish().unwrap();
        assert_eq!(stats.tuple_count, 400);
        assert!(storage.exists(&names.position()).unwrap());

        let mut reader = PlainVariableReader::<String>::open(&*storage, &names).unwrap();
        assert_eq!(reader.total_tuples(), 400);

        // Sequential decode reproduces the input
        let mut out = vec![String::new(); 400];
        assert_eq!(reader.read_values(&mut out).unwrap(), 400);
        assert_eq!(out, values);

        // Backward seek through the checkpoint list, then exact scan
        reader.seek_to_tuple(313).unwrap();
        assert_eq!(reader.read_value().unwrap(), values[313]);
        reader.seek_to_tuple(0).unwrap();
        assert_eq!(reader.read_value().unwrap(), values[0]);
        reader.seek_to_tuple(129).unwrap();
        assert_eq!(reader.read_value().unwrap(), values[129]);
    }

    #[test]
    fn test_variable_position_index_floor_property() {
        let (storage, names) = setup();
        let values: Vec<Vec<u8>> = (0..300u32).map(|i| i.to_be_bytes().to_vec()).collect();

        let mut writer =
            PlainVariableWriter::<Vec<u8>>::create(Arc::clone(&storage), &names).unwrap();
        writer.write_values(&values).unwrap();
        writer.finish().unwrap();

        let index = PositionIndex::load(&*storage, &names.position()).unwrap();
        // Checkpoints at 0, 128, 256 plus the sentinel
        assert_eq!(index.len(), 4);
        for probe in [0u64, 1, 127, 128, 200, 299] {
            let (tuple, _) = index.search_position(probe);
            assert!(tuple <= probe);
        }
        assert_eq!(index.total_tuples(), 300);
    }

    #[test]
    fn test_empty_files_both_kinds() {
        let (storage, names) = setup();
        let mut writer = PlainFixedWriter::<i16>::create(&*storage, &names).unwrap();
        let stats = writer.finish().unwrap();
        assert_eq!(stats.tuple_count, 0);
        let mut reader = PlainFixedReader::<i16>::open(&*storage, &names).unwrap();
        assert_eq!(reader.total_tuples(), 0);
        let mut out = [0i16; 4];
        assert_eq!(reader.read_values(&mut out).unwrap(), 0);

        let names2 = FileSetNames::new("t/c1");
        let mut writer =
            PlainVariableWriter::<String>::create(Arc::clone(&storage), &names2).unwrap();
        writer.finish().unwrap();
        let mut reader = PlainVariableReader::<String>::open(&*storage, &names2).unwrap();
        assert_eq!(reader.total_tuples(), 0);
    }

    #[test]
    fn test_fixed_ragged_file_is_corrupt() {
        let (storage, names) = setup();
        let mut a = storage.create_append(&names.data()).unwrap();
        use std::io::Write;
        a.write_all(&[0u8; 10]).unwrap(); // not a multiple of 4
        a.finish().unwrap();
        let err = PlainFixedReader::<i32>::open(&*storage, &names).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)), "got {:?}", err);
    }
}
