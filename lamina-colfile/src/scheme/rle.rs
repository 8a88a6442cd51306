//! Run-length encoded column files.
//!
//! ```text
//! runs: [run_length: u32 BE, value] × run_count
//! ```
//!
//! The position file checkpoints every run boundary —
//! `(run_start_tuple, run_byte_offset)` — so a seek lands exactly on the
//! run containing the target tuple. Run lengths over a whole file sum to
//! the tuple count and adjacent runs never hold equal values (equality is
//! bitwise for floats).
//!
//! The reader exposes two views over one stream: the decompressed
//! [`TypedReader`] materializes repeated values, while
//! [`current_run`](RleReader::current_run) / [`next_run`](RleReader::next_run)
//! hand out whole runs for in-situ processing that avoids materializing
//! repeats.

use super::{size_kb, DataSink, TypedReader, TypedWriter, WriterState};
use crate::bundle::{ColumnFileStats, FileSetNames};
use crate::index::{PositionIndex, PositionIndexBuilder};
use crate::value::{fill, ColumnValue, ValueRun};
use lamina_core::error::{Error, Result};
use lamina_core::storage::{Storage, StorageReader};
use lamina_core::wire;
use std::io::{BufReader, Seek, SeekFrom};
use std::sync::Arc;

// ============================================================================
// Writer
// ============================================================================

/// Run-length writer: keeps one open run and extends it while incoming
/// values repeat.
pub struct RleWriter<T: ColumnValue> {
    sink: DataSink,
    position: PositionIndexBuilder,
    /// The run still being extended: (value, length so far).
    current: Option<(T, u32)>,
    /// Tuples covered by flushed runs.
    emitted_tuples: u64,
    runs: u64,
    uncompressed_bytes: u64,
    state: WriterState,
    storage: Arc<dyn Storage>,
    position_name: String,
}

impl<T: ColumnValue> RleWriter<T> {
    pub fn create(storage: Arc<dyn Storage>, names: &FileSetNames) -> Result<Self> {
        let sink = DataSink::new(storage.create_append(&names.data())?);
        Ok(Self {
            sink,
            position: PositionIndexBuilder::new(),
            current: None,
            emitted_tuples: 0,
            runs: 0,
            uncompressed_bytes: 0,
            state: WriterState::Open,
            position_name: names.position(),
            storage,
        })
    }

    /// Append a whole run without materializing its repeats, merging into
    /// the open run when the values match. The in-situ counterpart of
    /// `write_values` for run-to-run transfer between files.
    pub fn write_run(&mut self, value: &T, length: u32) -> Result<()> {
        self.state.ensure_open()?;
        if length == 0 {
            return Ok(());
        }
        self.uncompressed_bytes += value.encoded_len() * length as u64;
        match &mut self.current {
            Some((current_value, current_length))
                if current_value.value_eq(value)
                    && current_length.checked_add(length).is_some() =>
            {
                *current_length += length;
            }
            _ => {
                if let Some((v, l)) = self.current.take() {
                    self.emit_run(v, l)?;
                }
                self.current = Some((value.clone(), length));
            }
        }
        Ok(())
    }

    /// Close the open run: checkpoint its boundary and write its record.
    fn emit_run(&mut self, value: T, length: u32) -> Result<()> {
        self.position
            .add_checkpoint(self.emitted_tuples, self.sink.bytes_written());
        wire::write_u32(&mut self.sink, length)?;
        value.write_to(&mut self.sink)?;
        self.runs += 1;
        self.emitted_tuples += length as u64;
        Ok(())
    }
}

impl<T: ColumnValue> TypedWriter<T> for RleWriter<T> {
    fn write_values(&mut self, values: &[T]) -> Result<()> {
        self.state.ensure_open()?;
        for v in values {
            self.uncompressed_bytes += v.encoded_len();
            match &mut self.current {
                Some((value, length)) if value.value_eq(v) && *length < u32::MAX => {
                    *length += 1;
                }
                _ => {
                    if let Some((value, length)) = self.current.take() {
                        self.emit_run(value, length)?;
                    }
                    self.current = Some((v.clone(), 1));
                }
            }
        }
        Ok(())
    }

    fn tuple_count(&self) -> u64 {
        self.emitted_tuples + self.current.as_ref().map_or(0, |(_, len)| *len as u64)
    }

    fn finish(&mut self) -> Result<ColumnFileStats> {
        self.state.ensure_open()?;
        self.state = WriterState::Finished;
        if let Some((value, length)) = self.current.take() {
            self.emit_run(value, length)?;
        }
        let total = self.emitted_tuples;
        let (checksum, bytes) = self.sink.finish()?;
        let index = std::mem::take(&mut self.position).finish(total, bytes)?;
        index.store(&*self.storage, &self.position_name)?;
        tracing::debug!(
            tuples = total,
            runs = self.runs,
            bytes,
            "run-length column finished"
        );
        Ok(ColumnFileStats {
            tuple_count: total,
            run_count: Some(self.runs),
            checksum,
            uncompressed_size_kb: size_kb(self.uncompressed_bytes),
            ..ColumnFileStats::default()
        })
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Run-length reader over a finished file.
#[derive(Debug)]
pub struct RleReader<T: ColumnValue> {
    reader: BufReader<Box<dyn StorageReader>>,
    position: PositionIndex,
    total: u64,
    /// Next tuple the decompressed view will deliver.
    tuple: u64,
    /// The run containing `tuple`, once loaded.
    current: Option<ValueRun<T>>,
    /// Start tuple of the run at the stream cursor.
    stream_next_start: u64,
}

impl<T: ColumnValue> RleReader<T> {
    pub fn open(storage: &dyn Storage, names: &FileSetNames) -> Result<Self> {
        let position = PositionIndex::load(storage, &names.position())?;
        Ok(Self {
            reader: BufReader::new(storage.open_read(&names.data())?),
            total: position.total_tuples(),
            position,
            tuple: 0,
            current: None,
            stream_next_start: 0,
        })
    }

    /// Decode the run at the stream cursor into `current`.
    fn read_run_from_stream(&mut self) -> Result<()> {
        let length = wire::read_u32(&mut self.reader)?;
        if length == 0 {
            return Err(Error::corrupt("zero-length run"));
        }
        let value = T::read_from(&mut self.reader)?;
        self.current = Some(ValueRun {
            start_tuple: self.stream_next_start,
            run_length: length,
            value,
        });
        self.stream_next_start += length as u64;
        Ok(())
    }

    /// Ensure `current` covers `self.tuple`. Caller guarantees
    /// `self.tuple < self.total`.
    fn load_run(&mut self) -> Result<()> {
        loop {
            if let Some(run) = &self.current {
                if self.tuple < run.start_tuple + run.run_length as u64 {
                    return Ok(());
                }
            }
            self.read_run_from_stream()?;
        }
    }

    /// The run containing the current position, without advancing.
    ///
    /// `None` once the file is exhausted.
    pub fn current_run(&mut self) -> Result<Option<ValueRun<T>>> {
        if self.tuple >= self.total {
            return Ok(None);
        }
        self.load_run()?;
        Ok(self.current.clone())
    }

    /// Advance past the current run and return the following one.
    ///
    /// On a fresh reader this yields the first run. `None` once the file
    /// is exhausted; the decompressed view is positioned at the start of
    /// the returned run.
    pub fn next_run(&mut self) -> Result<Option<ValueRun<T>>> {
        if let Some(run) = &self.current {
            if self.tuple < run.start_tuple + run.run_length as u64 {
                self.tuple = run.start_tuple + run.run_length as u64;
            }
        }
        if self.tuple >= self.total {
            return Ok(None);
        }
        self.load_run()?;
        Ok(self.current.clone())
    }
}

impl<T: ColumnValue> TypedReader<T> for RleReader<T> {
    fn read_values(&mut self, out: &mut [T]) -> Result<usize> {
        let n = (out.len() as u64).min(self.total - self.tuple) as usize;
        let mut filled = 0usize;
        while filled < n {
            self.load_run()?;
            let run = self.current.as_ref().unwrap();
            let consumed = self.tuple - run.start_tuple;
            let available = run.run_length as u64 - consumed;
            let take = available.min((n - filled) as u64) as usize;
            fill(&mut out[filled..filled + take], &run.value);
            self.tuple += take as u64;
            filled += take;
        }
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
        if let Some(run) = &self.current {
            if tuple >= run.start_tuple && tuple < run.start_tuple + run.run_length as u64 {
                self.tuple = tuple;
                return Ok(());
            }
        }
        // Checkpoints sit at every run boundary, so the floor checkpoint
        // is the run containing the target.
        let (ck_tuple, ck_offset) = self.position.search_position(tuple);
        self.reader.seek(SeekFrom::Start(ck_offset))?;
        self.stream_next_start = ck_tuple;
        self.current = None;
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
