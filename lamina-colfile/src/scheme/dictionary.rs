//! Dictionary-compressed column files.
//!
//! ```text
//! data file:       codes at bytes_per_entry bytes each (signed, BE)
//! dictionary file: count: u32 BE, then the sorted values (trait array
//!                  encoding)
//! temp file:       provisional codes, i32 BE — write path only, deleted
//!                  by finish()
//! ```
//!
//! The writer accumulates the evolving distinct set while appending
//! provisional insertion-order codes to the temp file. `finish()` sorts
//! the distinct set, assigns order-preserving codes, picks the smallest
//! width that can address the distinct count, rewrites the temp file into
//! the properly-sized final data file, and persists the dictionary.
//!
//! The reader loads the dictionary lazily on first decoded access; the
//! [`code_reader`](DictionaryReader::code_reader) accessor reads the raw
//! code stream for predicate evaluation directly on codes and never
//! triggers dictionary loading.

use super::{size_kb, DataSink, TypedReader, TypedWriter, WriterState};
use crate::bundle::{ColumnFileStats, FileSetNames};
use crate::dict::{bytes_per_entry_for, OrderedDictionary};
use crate::value::{reorder, ColumnValue};
use lamina_core::error::{Error, Result};
use lamina_core::storage::{Storage, StorageAppender, StorageReader};
use lamina_core::wire;
use once_cell::sync::OnceCell;
use rustc_hash::FxHashMap;
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::sync::Arc;

// ============================================================================
// Writer
// ============================================================================

/// Dictionary writer: distinct-set accumulation plus a provisional code
/// stream, finalized in one pass at `finish()`.
pub struct DictionaryWriter<T: ColumnValue> {
    storage: Arc<dyn Storage>,
    data_name: String,
    dictionary_name: String,
    temp_name: String,
    temp: Box<dyn StorageAppender>,
    /// value identity → provisional code (insertion order).
    map: FxHashMap<T::Key, u32>,
    /// provisional code → value.
    values: Vec<T>,
    tuples: u64,
    uncompressed_bytes: u64,
    state: WriterState,
}

impl<T: ColumnValue> DictionaryWriter<T> {
    pub fn create(storage: Arc<dyn Storage>, names: &FileSetNames) -> Result<Self> {
        let temp = storage.create_append(&names.temp())?;
        Ok(Self {
            data_name: names.data(),
            dictionary_name: names.dictionary(),
            temp_name: names.temp(),
            temp,
            map: FxHashMap::default(),
            values: Vec::new(),
            tuples: 0,
            uncompressed_bytes: 0,
            state: WriterState::Open,
            storage,
        })
    }

    /// Distinct values seen so far.
    pub fn distinct_count(&self) -> usize {
        self.values.len()
    }
}

impl<T: ColumnValue> TypedWriter<T> for DictionaryWriter<T> {
    fn write_values(&mut self, values: &[T]) -> Result<()> {
        self.state.ensure_open()?;
        for v in values {
            self.uncompressed_bytes += v.encoded_len();
            let provisional = match self.map.get(&v.to_key()) {
                Some(&id) => id,
                None => {
                    if self.values.len() >= i32::MAX as usize {
                        return Err(Error::capacity(
                            "dictionary distinct-value count exceeds the 4-byte code space",
                        ));
                    }
                    let id = self.values.len() as u32;
                    self.values.push(v.clone());
                    self.map.insert(v.to_key(), id);
                    id
                }
            };
            wire::write_i32(&mut self.temp, provisional as i32)?;
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
        self.temp.finish()?;

        // Sort the distinct set and map provisional → sorted position.
        let distinct = self.values.len();
        let mut order: Vec<u32> = (0..distinct as u32).collect();
        order.sort_unstable_by(|&a, &b| {
            self.values[a as usize].total_cmp(&self.values[b as usize])
        });
        let mut conversion = vec![0u32; distinct];
        for (sorted_index, &provisional) in order.iter().enumerate() {
            conversion[provisional as usize] = sorted_index as u32;
        }
        let dictionary = OrderedDictionary::from_sorted(reorder(&self.values, &order))?;

        // Persist the dictionary file.
        let mut dic = self.storage.create_append(&self.dictionary_name)?;
        dic.write_all(&dictionary.serialize()?)?;
        dic.finish()?;

        // Rewrite the provisional code stream at the final width.
        let mut temp_reader = BufReader::new(self.storage.open_read(&self.temp_name)?);
        let mut sink = DataSink::new(self.storage.create_append(&self.data_name)?);
        for _ in 0..self.tuples {
            let provisional = wire::read_i32(&mut temp_reader)?;
            let index = conversion
                .get(provisional as usize)
                .copied()
                .ok_or_else(|| {
                    Error::corrupt(format!(
                        "temporary code file references unknown entry {}",
                        provisional
                    ))
                })?;
            let code = dictionary.index_to_code(index as usize);
            match dictionary.bytes_per_entry() {
                1 => wire::write_i8(&mut sink, code as i8)?,
                2 => wire::write_i16(&mut sink, code as i16)?,
                _ => wire::write_i32(&mut sink, code)?,
            }
        }
        let (checksum, bytes) = sink.finish()?;
        self.storage.delete(&self.temp_name)?;

        tracing::debug!(
            tuples = self.tuples,
            distinct,
            bytes_per_entry = dictionary.bytes_per_entry(),
            bytes,
            "dictionary column finished"
        );
        Ok(ColumnFileStats {
            tuple_count: self.tuples,
            distinct_values: Some(distinct as u64),
            dictionary_bytes_per_entry: Some(dictionary.bytes_per_entry()),
            checksum,
            uncompressed_size_kb: size_kb(self.uncompressed_bytes),
            ..ColumnFileStats::default()
        })
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Dictionary reader. The code stream is fixed-stride, so seeks are O(1);
/// the dictionary itself loads on first decoded access only.
#[derive(Debug)]
pub struct DictionaryReader<T: ColumnValue> {
    storage: Arc<dyn Storage>,
    dictionary_name: String,
    reader: BufReader<Box<dyn StorageReader>>,
    bytes_per_entry: u8,
    total: u64,
    tuple: u64,
    dictionary: OnceCell<OrderedDictionary<T>>,
}

impl<T: ColumnValue> DictionaryReader<T> {
    pub fn open(storage: Arc<dyn Storage>, names: &FileSetNames) -> Result<Self> {
        // The code width derives from the entry count alone; read the
        // count header without loading the entries.
        let mut dic_reader = storage.open_read(&names.dictionary())?;
        let entry_count = wire::read_u32(&mut dic_reader)? as usize;
        drop(dic_reader);
        let bytes_per_entry = bytes_per_entry_for(entry_count)?;

        let data_name = names.data();
        let size = storage.size(&data_name)?;
        if size % bytes_per_entry as u64 != 0 {
            return Err(Error::corrupt(format!(
                "dictionary data file size {} not a multiple of code width {}",
                size, bytes_per_entry
            )));
        }
        Ok(Self {
            reader: BufReader::new(storage.open_read(&data_name)?),
            dictionary_name: names.dictionary(),
            bytes_per_entry,
            total: size / bytes_per_entry as u64,
            tuple: 0,
            dictionary: OnceCell::new(),
            storage,
        })
    }

    /// The order-preserving dictionary, loaded on first call.
    pub fn dictionary(&self) -> Result<&OrderedDictionary<T>> {
        self.dictionary.get_or_try_init(|| {
            let data = self.storage.read_all(&self.dictionary_name)?;
            let dict = OrderedDictionary::deserialize(&data)?;
            if bytes_per_entry_for(dict.len())? != self.bytes_per_entry {
                return Err(Error::corrupt(
                    "dictionary entry count disagrees with code width",
                ));
            }
            Ok(dict)
        })
    }

    /// Whether the dictionary has been materialized yet.
    pub fn dictionary_loaded(&self) -> bool {
        self.dictionary.get().is_some()
    }

    /// Raw-code view over the same stream: reads integer codes without
    /// dictionary lookup, for in-situ predicate evaluation. Never loads
    /// the dictionary.
    pub fn code_reader(&mut self) -> DictionaryCodeReader<'_, T> {
        DictionaryCodeReader { inner: self }
    }

    /// Decode the next `out.len()`-bounded batch of raw codes.
    fn fill_codes(&mut self, out: &mut [i32]) -> Result<usize> {
        let n = (out.len() as u64).min(self.total - self.tuple) as usize;
        let width = self.bytes_per_entry as usize;
        let mut buf = vec![0u8; n * width];
        std::io::Read::read_exact(&mut self.reader, &mut buf)?;
        for (i, slot) in out[..n].iter_mut().enumerate() {
            let at = i * width;
            *slot = match width {
                1 => i8::from_be_bytes([buf[at]]) as i32,
                2 => i16::from_be_bytes([buf[at], buf[at + 1]]) as i32,
                _ => i32::from_be_bytes(buf[at..at + 4].try_into().unwrap()),
            };
        }
        self.tuple += n as u64;
        Ok(n)
    }

    fn seek_codes(&mut self, tuple: u64) -> Result<()> {
        if tuple > self.total {
            return Err(Error::usage(format!(
                "seek to tuple {} past end of {}-tuple file",
                tuple, self.total
            )));
        }
        self.reader
            .seek(SeekFrom::Start(tuple * self.bytes_per_entry as u64))?;
        self.tuple = tuple;
        Ok(())
    }
}

impl<T: ColumnValue> TypedReader<T> for DictionaryReader<T> {
    fn read_values(&mut self, out: &mut [T]) -> Result<usize> {
        let mut codes = vec![0i32; out.len()];
        let n = self.fill_codes(&mut codes)?;
        let dictionary = self.dictionary()?;
        for (slot, &code) in out[..n].iter_mut().zip(&codes) {
            *slot = dictionary.decompress(code)?.clone();
        }
        Ok(n)
    }

    fn skip_values(&mut self, n: u64) -> Result<()> {
        let target = self.tuple + n;
        self.seek_codes(target)
    }

    fn seek_to_tuple(&mut self, tuple: u64) -> Result<()> {
        self.seek_codes(tuple)
    }

    fn total_tuples(&self) -> u64 {
        self.total
    }

    fn current_tuple(&self) -> u64 {
        self.tuple
    }
}

/// Narrow raw-code interface over an open [`DictionaryReader`].
pub struct DictionaryCodeReader<'a, T: ColumnValue> {
    inner: &'a mut DictionaryReader<T>,
}

impl<T: ColumnValue> DictionaryCodeReader<'_, T> {
    /// Fill `out` with raw codes; returns the count read.
    pub fn read_codes(&mut self, out: &mut [i32]) -> Result<usize> {
        self.inner.fill_codes(out)
    }

    pub fn skip_codes(&mut self, n: u64) -> Result<()> {
        let target = self.inner.tuple + n;
        self.inner.seek_codes(target)
    }

    pub fn seek_to_tuple(&mut self, tuple: u64) -> Result<()> {
        self.inner.seek_codes(tuple)
    }

    pub fn total_tuples(&self) -> u64 {
        self.inner.total
    }

    pub fn current_tuple(&self) -> u64 {
        self.inner.tuple
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lamina_core::storage::MemoryStorage;

    fn setup() -> (Arc<dyn Storage>, FileSetNames) {
        (Arc::new(MemoryStorage::new()), FileSetNames::new("t/dict"))
    }

    #[test]
    fn test_varchar_round_trip_and_width() {
        let (storage, names) = setup();
        let values: Vec<String> = ["banana", "apple", "cherry", "banana", "apple"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut writer = DictionaryWriter::<String>::create(Arc::clone(&storage), &names).unwrap();
        writer.write_values(&values).unwrap();
        assert_eq!(writer.distinct_count(), 3);
        let stats = writer.finish().unwrap();
        assert_eq!(stats.tuple_count, 5);
        assert_eq!(stats.distinct_values, Some(3));
        assert_eq!(stats.dictionary_bytes_per_entry, Some(1));
        // Temp file is gone after finish()
        assert!(!storage.exists(&names.temp()).unwrap());
        assert!(storage.exists(&names.dictionary()).unwrap());

        let mut reader =
            DictionaryReader::<String>::open(Arc::clone(&storage), &names).unwrap();
        let mut out = vec![String::new(); 5];
        assert_eq!(reader.read_values(&mut out).unwrap(), 5);
        assert_eq!(out, values);

        // Order preservation on the loaded dictionary
        let dict = reader.dictionary().unwrap();
        let banana = dict.compress(&"banana".to_string()).unwrap();
        let cherry = dict.compress(&"cherry".to_string()).unwrap();
        assert!(banana < cherry);
    }

    #[test]
    fn test_code_reader_never_loads_dictionary() {
        let (storage, names) = setup();
        let values: Vec<i64> = vec![30, 10, 20, 30, 30, 10];
        let mut writer = DictionaryWriter::<i64>::create(Arc::clone(&storage), &names).unwrap();
        writer.write_values(&values).unwrap();
        writer.finish().unwrap();

        let mut reader = DictionaryReader::<i64>::open(Arc::clone(&storage), &names).unwrap();
        let mut codes = vec![0i32; 6];
        {
            let mut code_reader = reader.code_reader();
            assert_eq!(code_reader.total_tuples(), 6);
            assert_eq!(code_reader.read_codes(&mut codes).unwrap(), 6);
        }
        assert!(!reader.dictionary_loaded());

        // Sorted dictionary is [10, 20, 30] → codes start at the signed
        // minimum of the 1-byte width.
        assert_eq!(codes, vec![-126, -128, -127, -126, -126, -128]);

        // Decoded access after the fact still works (and loads the dict).
        reader.seek_to_tuple(0).unwrap();
        let mut out = vec![0i64; 6];
        reader.read_values(&mut out).unwrap();
        assert_eq!(out, values);
        assert!(reader.dictionary_loaded());
    }

    #[test]
    fn test_two_byte_width() {
        let (storage, names) = setup();
        // 300 distinct values forces 2-byte codes.
        let values: Vec<i32> = (0..300).rev().collect();
        let mut writer = DictionaryWriter::<i32>::create(Arc::clone(&storage), &names).unwrap();
        writer.write_values(&values).unwrap();
        let stats = writer.finish().unwrap();
        assert_eq!(stats.distinct_values, Some(300));
        assert_eq!(stats.dictionary_bytes_per_entry, Some(2));
        assert_eq!(storage.size(&names.data()).unwrap(), 600);

        let mut reader = DictionaryReader::<i32>::open(Arc::clone(&storage), &names).unwrap();
        let mut out = vec![0i32; 300];
        reader.read_values(&mut out).unwrap();
        assert_eq!(out, values);
    }

    #[test]
    fn test_seek_on_code_stride() {
        let (storage, names) = setup();
        let values: Vec<i16> = (0..200).map(|i| (i % 7) as i16).collect();
        let mut writer = DictionaryWriter::<i16>::create(Arc::clone(&storage), &names).unwrap();
        writer.write_values(&values).unwrap();
        writer.finish().unwrap();

        let mut reader = DictionaryReader::<i16>::open(Arc::clone(&storage), &names).unwrap();
        reader.seek_to_tuple(153).unwrap();
        assert_eq!(reader.read_value().unwrap(), values[153]);
        reader.skip_values(10).unwrap();
        assert_eq!(reader.read_value().unwrap(), values[164]);
    }

    #[test]
    fn test_empty_dictionary_file() {
        let (storage, names) = setup();
        let mut writer = DictionaryWriter::<String>::create(Arc::clone(&storage), &names).unwrap();
        let stats = writer.finish().unwrap();
        assert_eq!(stats.tuple_count, 0);
        assert_eq!(stats.distinct_values, Some(0));

        let mut reader =
            DictionaryReader::<String>::open(Arc::clone(&storage), &names).unwrap();
        assert_eq!(reader.total_tuples(), 0);
        let mut out = vec![String::new(); 1];
        assert_eq!(reader.read_values(&mut out).unwrap(), 0);
    }

    #[test]
    fn test_float_dictionary_bit_distinct() {
        let (storage, names) = setup();
        let values = vec![0.0f64, -0.0, 0.0, -0.0];
        let mut writer = DictionaryWriter::<f64>::create(Arc::clone(&storage), &names).unwrap();
        writer.write_values(&values).unwrap();
        let stats = writer.finish().unwrap();
        assert_eq!(stats.distinct_values, Some(2));

        let mut reader = DictionaryReader::<f64>::open(Arc::clone(&storage), &names).unwrap();
        let mut out = vec![0.0f64; 4];
        reader.read_values(&mut out).unwrap();
        for (a, b) in values.iter().zip(&out) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
