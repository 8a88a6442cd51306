//! Block-compressed column files (general-purpose codecs).
//!
//! ```text
//! blocks: [value_count: u32 BE, raw_len: u32 BE, comp_len: u32 BE,
//!          comp_len bytes of codec payload] × block_count
//! ```
//!
//! Values are buffered until roughly `block_size_bytes` of encoded bytes
//! accumulate, then the block is compressed independently and written as a
//! length-prefixed chunk. The position file checkpoints every block start
//! `(block_first_tuple, block_byte_offset)`, so a seek decompresses one
//! block instead of the whole file.

use super::{size_kb, DataSink, TypedReader, TypedWriter, WriterState};
use crate::bundle::{ColumnFileStats, FileSetNames};
use crate::index::{PositionIndex, PositionIndexBuilder};
use crate::value::ColumnValue;
use lamina_core::error::{Error, Result};
use lamina_core::storage::{Storage, StorageReader};
use lamina_core::types::CompressionType;
use lamina_core::wire;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

/// Default target of pre-compression bytes per block.
pub const DEFAULT_BLOCK_SIZE_BYTES: usize = 64 * 1024;

/// zstd level for block payloads. Level 1 favors import throughput; the
/// format records raw lengths, so the level is not part of the contract.
const ZSTD_LEVEL: i32 = 1;

// ============================================================================
// Codec
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockCodec {
    Gzip,
    Snappy,
    Zstd,
}

impl BlockCodec {
    pub(crate) fn for_compression(compression: CompressionType) -> Result<Self> {
        match compression {
            CompressionType::BlockGzip => Ok(Self::Gzip),
            CompressionType::BlockSnappy => Ok(Self::Snappy),
            CompressionType::BlockZstd => Ok(Self::Zstd),
            other => Err(Error::usage(format!(
                "block codec requested for non-block compression type {:?}",
                other
            ))),
        }
    }

    fn compress(self, raw: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Gzip => {
                let mut encoder =
                    flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(raw)?;
                Ok(encoder.finish()?)
            }
            Self::Snappy => snap::raw::Encoder::new()
                .compress_vec(raw)
                .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e))),
            Self::Zstd => Ok(zstd::bulk::compress(raw, ZSTD_LEVEL)?),
        }
    }

    fn decompress(self, payload: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        let raw = match self {
            Self::Gzip => {
                let mut out = Vec::with_capacity(raw_len);
                flate2::bufread::GzDecoder::new(payload)
                    .read_to_end(&mut out)
                    .map_err(|e| Error::corrupt(format!("gzip block decode failed: {}", e)))?;
                out
            }
            Self::Snappy => snap::raw::Decoder::new()
                .decompress_vec(payload)
                .map_err(|e| Error::corrupt(format!("snappy block decode failed: {}", e)))?,
            Self::Zstd => zstd::bulk::decompress(payload, raw_len)
                .map_err(|e| Error::corrupt(format!("zstd block decode failed: {}", e)))?,
        };
        if raw.len() != raw_len {
            return Err(Error::corrupt(format!(
                "block decompressed to {} bytes, header says {}",
                raw.len(),
                raw_len
            )));
        }
        Ok(raw)
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Block writer: fixed-size staging of encoded values, one codec call per
/// block.
pub struct BlockWriter<T: ColumnValue> {
    sink: DataSink,
    codec: BlockCodec,
    position: PositionIndexBuilder,
    block_size_bytes: usize,
    /// Encoded pending values for the open block.
    raw: Vec<u8>,
    pending_values: u32,
    block_first_tuple: u64,
    tuples: u64,
    uncompressed_bytes: u64,
    state: WriterState,
    storage: Arc<dyn Storage>,
    position_name: String,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: ColumnValue> BlockWriter<T> {
    pub fn create(
        storage: Arc<dyn Storage>,
        names: &FileSetNames,
        compression: CompressionType,
        block_size_bytes: usize,
    ) -> Result<Self> {
        let codec = BlockCodec::for_compression(compression)?;
        let sink = DataSink::new(storage.create_append(&names.data())?);
        Ok(Self {
            sink,
            codec,
            position: PositionIndexBuilder::new(),
            block_size_bytes: block_size_bytes.max(1),
            raw: Vec::with_capacity(block_size_bytes.max(1)),
            pending_values: 0,
            block_first_tuple: 0,
            tuples: 0,
            uncompressed_bytes: 0,
            state: WriterState::Open,
            position_name: names.position(),
            storage,
            _marker: std::marker::PhantomData,
        })
    }

    /// Compress and write the open block, checkpointing its start.
    fn flush_block(&mut self) -> Result<()> {
        if self.pending_values == 0 {
            return Ok(());
        }
        self.position
            .add_checkpoint(self.block_first_tuple, self.sink.bytes_written());
        let compressed = self.codec.compress(&self.raw)?;
        wire::write_u32(&mut self.sink, self.pending_values)?;
        wire::write_u32(&mut self.sink, self.raw.len() as u32)?;
        wire::write_u32(&mut self.sink, compressed.len() as u32)?;
        self.sink.write_all(&compressed)?;

        self.uncompressed_bytes += self.raw.len() as u64;
        self.block_first_tuple = self.tuples;
        self.pending_values = 0;
        self.raw.clear();
        Ok(())
    }
}

impl<T: ColumnValue> TypedWriter<T> for BlockWriter<T> {
    fn write_values(&mut self, values: &[T]) -> Result<()> {
        self.state.ensure_open()?;
        for v in values {
            v.write_to(&mut self.raw)?;
            self.pending_values += 1;
            self.tuples += 1;
            if self.raw.len() >= self.block_size_bytes {
                self.flush_block()?;
            }
        }
        Ok(())
    }

    fn tuple_count(&self) -> u64 {
        self.tuples
    }

    fn finish(&mut self) -> Result<ColumnFileStats> {
        self.state.ensure_open()?;
        self.state = WriterState::Finished;
        self.flush_block()?;
        let (checksum, bytes) = self.sink.finish()?;
        let index = std::mem::take(&mut self.position).finish(self.tuples, bytes)?;
        index.store(&*self.storage, &self.position_name)?;
        tracing::debug!(
            tuples = self.tuples,
            blocks = index.len().saturating_sub(1),
            compressed_bytes = bytes,
            uncompressed_bytes = self.uncompressed_bytes,
            "block column finished"
        );
        Ok(ColumnFileStats {
            tuple_count: self.tuples,
            checksum,
            uncompressed_size_kb: size_kb(self.uncompressed_bytes),
            ..ColumnFileStats::default()
        })
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Block reader: seek-then-decompress-one-block random access.
pub struct BlockReader<T: ColumnValue> {
    reader: BufReader<Box<dyn StorageReader>>,
    codec: BlockCodec,
    position: PositionIndex,
    total: u64,
    /// Next tuple the decoded view will deliver.
    tuple: u64,
    /// Decoded values of the current block (empty = none loaded).
    block: Vec<T>,
    /// First tuple of the decoded block.
    block_start: u64,
    /// First tuple of the block at the stream cursor.
    stream_next_start: u64,
}

impl<T: ColumnValue> BlockReader<T> {
    pub fn open(
        storage: &dyn Storage,
        names: &FileSetNames,
        compression: CompressionType,
    ) -> Result<Self> {
        let codec = BlockCodec::for_compression(compression)?;
        let position = PositionIndex::load(storage, &names.position())?;
        Ok(Self {
            reader: BufReader::new(storage.open_read(&names.data())?),
            codec,
            total: position.total_tuples(),
            position,
            tuple: 0,
            block: Vec::new(),
            block_start: 0,
            stream_next_start: 0,
        })
    }

    /// Decode the block at the stream cursor.
    fn read_block_from_stream(&mut self) -> Result<()> {
        let value_count = wire::read_u32(&mut self.reader)? as usize;
        let raw_len = wire::read_u32(&mut self.reader)? as usize;
        let comp_len = wire::read_u32(&mut self.reader)? as usize;
        if value_count == 0 {
            return Err(Error::corrupt("empty block"));
        }
        let mut payload = vec![0u8; comp_len];
        self.reader.read_exact(&mut payload)?;
        let raw = self.codec.decompress(&payload, raw_len)?;

        let mut values = vec![T::default(); value_count];
        let mut cursor = std::io::Cursor::new(&raw);
        T::read_slice(&mut cursor, &mut values)?;
        if cursor.position() != raw.len() as u64 {
            return Err(Error::corrupt(format!(
                "block holds {} bytes beyond its {} values",
                raw.len() as u64 - cursor.position(),
                value_count
            )));
        }

        self.block_start = self.stream_next_start;
        self.stream_next_start += value_count as u64;
        self.block = values;
        Ok(())
    }

    /// Ensure the decoded block covers `self.tuple`. Caller guarantees
    /// `self.tuple < self.total`.
    fn load_block(&mut self) -> Result<()> {
        loop {
            if !self.block.is_empty()
                && self.tuple >= self.block_start
                && self.tuple < self.block_start + self.block.len() as u64
            {
                return Ok(());
            }
            self.read_block_from_stream()?;
        }
    }
}

impl<T: ColumnValue> TypedReader<T> for BlockReader<T> {
    fn read_values(&mut self, out: &mut [T]) -> Result<usize> {
        let n = (out.len() as u64).min(self.total - self.tuple) as usize;
        let mut filled = 0usize;
        while filled < n {
            self.load_block()?;
            let at = (self.tuple - self.block_start) as usize;
            let available = self.block.len() - at;
            let take = available.min(n - filled);
            out[filled..filled + take].clone_from_slice(&self.block[at..at + take]);
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
        if !self.block.is_empty()
            && tuple >= self.block_start
            && tuple < self.block_start + self.block.len() as u64
        {
            self.tuple = tuple;
            return Ok(());
        }
        // Checkpoints sit at every block start, so the floor checkpoint
        // is the block containing the target.
        let (ck_tuple, ck_offset) = self.position.search_position(tuple);
        self.reader.seek(SeekFrom::Start(ck_offset))?;
        self.stream_next_start = ck_tuple;
        self.block.clear();
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

#[cfg(test)]
mod tests {
    use super::*;
    use lamina_core::storage::MemoryStorage;

    fn setup() -> (Arc<dyn Storage>, FileSetNames) {
        (Arc::new(MemoryStorage::new()), FileSetNames::new("t/blk"))
    }

    fn write_blocks<T: ColumnValue>(
        storage: &Arc<dyn Storage>,
        names: &FileSetNames,
        compression: CompressionType,
        block_size: usize,
        values: &[T],
    ) -> ColumnFileStats {
        let mut writer =
            BlockWriter::<T>::create(Arc::clone(storage), names, compression, block_size).unwrap();
        writer.write_values(values).unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn test_snappy_two_block_scenario() {
        let (storage, names) = setup();
        let values: Vec<i32> = (0..1000).collect();
        // 1000 × 4 bytes at a 2000-byte block target → exactly 2 blocks.
        let stats = write_blocks(&storage, &names, CompressionType::BlockSnappy, 2000, &values);
        assert_eq!(stats.tuple_count, 1000);
        assert_eq!(stats.uncompressed_size_kb, 4000u64.div_ceil(1024));

        let index = PositionIndex::load(&*storage, &names.position()).unwrap();
        // 2 block-boundary entries + 1 sentinel
        assert_eq!(index.len(), 3);
        assert_eq!(index.entries()[0], (0, 0));
        assert_eq!(index.entries()[1].0, 500);
        assert_eq!(index.total_tuples(), 1000);

        let mut reader =
            BlockReader::<i32>::open(&*storage, &names, CompressionType::BlockSnappy).unwrap();
        let mut out = vec![0i32; 1000];
        assert_eq!(reader.read_values(&mut out).unwrap(), 1000);
        assert_eq!(out, values);
    }

    #[test]
    fn test_gzip_and_zstd_round_trip() {
        for compression in [CompressionType::BlockGzip, CompressionType::BlockZstd] {
            let (storage, names) = setup();
            let values: Vec<i64> = (0..5000).map(|i| (i * i) % 9973).collect();
            write_blocks(&storage, &names, compression, 4096, &values);

            let mut reader = BlockReader::<i64>::open(&*storage, &names, compression).unwrap();
            assert_eq!(reader.total_tuples(), 5000);
            let mut out = vec![0i64; 5000];
            reader.read_values(&mut out).unwrap();
            assert_eq!(out, values, "{:?}", compression);
        }
    }

    #[test]
    fn test_variable_length_blocks() {
        let (storage, names) = setup();
        let values: Vec<String> = (0..800).map(|i| format!("value-{:04}", i)).collect();
        write_blocks(&storage, &names, CompressionType::BlockZstd, 1024, &values);

        let mut reader =
            BlockReader::<String>::open(&*storage, &names, CompressionType::BlockZstd).unwrap();
        let mut out = vec![String::new(); 800];
        reader.read_values(&mut out).unwrap();
        assert_eq!(out, values);
    }

    #[test]
    fn test_seek_decompresses_single_block() {
        let (storage, names) = setup();
        let values: Vec<i32> = (0..1000).collect();
        write_blocks(&storage, &names, CompressionType::BlockGzip, 400, &values);

        let mut reader =
            BlockReader::<i32>::open(&*storage, &names, CompressionType::BlockGzip).unwrap();
        reader.seek_to_tuple(777).unwrap();
        assert_eq!(reader.read_value().unwrap(), 777);
        // Backward across blocks
        reader.seek_to_tuple(3).unwrap();
        assert_eq!(reader.read_value().unwrap(), 3);
        // Within the already-decoded block
        reader.seek_to_tuple(5).unwrap();
        assert_eq!(reader.read_value().unwrap(), 5);
        // Reading spans block boundaries after a seek
        reader.seek_to_tuple(95).unwrap();
        let mut out = vec![0i32; 20];
        assert_eq!(reader.read_values(&mut out).unwrap(), 20);
        assert_eq!(out, (95..115).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_block_file() {
        let (storage, names) = setup();
        let stats =
            write_blocks::<i32>(&storage, &names, CompressionType::BlockSnappy, 1024, &[]);
        assert_eq!(stats.tuple_count, 0);
        let mut reader =
            BlockReader::<i32>::open(&*storage, &names, CompressionType::BlockSnappy).unwrap();
        assert_eq!(reader.total_tuples(), 0);
        let mut out = [0i32; 4];
        assert_eq!(reader.read_values(&mut out).unwrap(), 0);
    }

    #[test]
    fn test_corrupt_payload_is_corrupt_error() {
        let (storage, names) = setup();
        write_blocks(&storage, &names, CompressionType::BlockSnappy, 1024, &[1i32, 2, 3]);

        // Flip bytes inside the compressed payload (past the 12-byte
        // block header).
        let mut data = storage.read_all(&names.data()).unwrap();
        for b in data.iter_mut().skip(12) {
            *b ^= 0xA5;
        }
        let mut appender = storage.create_append(&names.data()).unwrap();
        appender.write_all(&data).unwrap();
        appender.finish().unwrap();

        let mut reader =
            BlockReader::<i32>::open(&*storage, &names, CompressionType::BlockSnappy).unwrap();
        let mut out = [0i32; 3];
        let err = reader.read_values(&mut out).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)), "got {:?}", err);
    }

    #[test]
    fn test_non_block_compression_rejected() {
        let err = BlockCodec::for_compression(CompressionType::RunLength).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }
}
