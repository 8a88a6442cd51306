//! Order-preserving dictionary: a sorted distinct value table plus an
//! integer coding scheme that preserves value ordering.
//!
//! ## Code space
//!
//! Codes use the full signed range of the chosen width, assigned starting
//! at the minimum representable value rather than at zero, so the sign bit
//! participates in ordering: entry `i` of a width-`w` dictionary gets code
//! `min_w + i`. Every code in the signed range is usable, including the
//! maximum — "not found" is an out-of-band `Option`, never an in-band
//! code — so a width holds exactly `2^(8w)` entries.
//!
//! Width selection picks the smallest of {1, 2, 4} bytes that can address
//! the distinct count; counts beyond the 4-byte space (bounded at
//! `i32::MAX` by array indexing) are a capacity error.

use crate::value::ColumnValue;
use lamina_core::error::{Error, Result};
use std::cmp::Ordering;

/// Smallest code width in bytes that can address `count` entries.
pub fn bytes_per_entry_for(count: usize) -> Result<u8> {
    if count <= 1 << 8 {
        Ok(1)
    } else if count <= 1 << 16 {
        Ok(2)
    } else if count <= i32::MAX as usize {
        Ok(4)
    } else {
        Err(Error::capacity(format!(
            "dictionary distinct-value count {} exceeds the 4-byte code space",
            count
        )))
    }
}

/// Minimum code value for a given width.
#[inline]
fn min_code_for(bytes_per_entry: u8) -> i32 {
    match bytes_per_entry {
        1 => i8::MIN as i32,
        2 => i16::MIN as i32,
        _ => i32::MIN,
    }
}

/// Sorted distinct value table with order-preserving integer codes.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedDictionary<T: ColumnValue> {
    /// Sorted, duplicate-free under the value's total order.
    values: Vec<T>,
    /// Code width: 1, 2, or 4 bytes.
    bytes_per_entry: u8,
}

impl<T: ColumnValue> OrderedDictionary<T> {
    /// Build from a sorted distinct value array.
    pub fn from_sorted(values: Vec<T>) -> Result<Self> {
        for pair in values.windows(2) {
            if pair[0].total_cmp(&pair[1]) != Ordering::Less {
                return Err(Error::corrupt(
                    "dictionary values not sorted and distinct",
                ));
            }
        }
        let bytes_per_entry = bytes_per_entry_for(values.len())?;
        Ok(Self {
            values,
            bytes_per_entry,
        })
    }

    /// Code width in bytes.
    #[inline]
    pub fn bytes_per_entry(&self) -> u8 {
        self.bytes_per_entry
    }

    /// Number of distinct entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The sorted distinct values.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Smallest assignable code for this width.
    #[inline]
    pub fn min_code(&self) -> i32 {
        min_code_for(self.bytes_per_entry)
    }

    /// Translate a signed code to its 0-based dictionary index.
    #[inline]
    pub fn code_to_index(&self, code: i32) -> i64 {
        code as i64 - self.min_code() as i64
    }

    /// Translate a 0-based dictionary index to its signed code.
    #[inline]
    pub fn index_to_code(&self, index: usize) -> i32 {
        (index as i64 + self.min_code() as i64) as i32
    }

    /// Code for a value present in the dictionary, else `None`.
    pub fn compress(&self, value: &T) -> Option<i32> {
        self.values
            .binary_search_by(|probe| probe.total_cmp(value))
            .ok()
            .map(|i| self.index_to_code(i))
    }

    /// Code of the largest entry ≤ `value`, else `None`.
    ///
    /// Supports range-predicate lower bounds evaluated directly against
    /// compressed data.
    pub fn compress_lower(&self, value: &T) -> Option<i32> {
        let pp = self
            .values
            .partition_point(|probe| probe.total_cmp(value) != Ordering::Greater);
        if pp == 0 {
            None
        } else {
            Some(self.index_to_code(pp - 1))
        }
    }

    /// Value for a code. Out-of-range codes are corruption.
    pub fn decompress(&self, code: i32) -> Result<&T> {
        let index = self.code_to_index(code);
        if index < 0 || index >= self.values.len() as i64 {
            return Err(Error::corrupt(format!(
                "dictionary code {} outside entry range 0..{}",
                code,
                self.values.len()
            )));
        }
        Ok(&self.values[index as usize])
    }

    /// Batched compress; fails with `NotFound` on the first absent value.
    pub fn compress_batch(&self, values: &[T], out: &mut Vec<i32>) -> Result<()> {
        out.reserve(values.len());
        for v in values {
            match self.compress(v) {
                Some(code) => out.push(code),
                None => {
                    return Err(Error::not_found(
                        "value not present in dictionary".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Batched decompress.
    pub fn decompress_batch(&self, codes: &[i32], out: &mut Vec<T>) -> Result<()> {
        out.reserve(codes.len());
        for &code in codes {
            out.push(self.decompress(code)?.clone());
        }
        Ok(())
    }

    /// Serialize the sorted value table with the value trait's array
    /// serializer.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        T::serialize_array(&self.values)
    }

    /// Deserialize a dictionary written by [`serialize`](Self::serialize).
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        Self::from_sorted(T::deserialize_array(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_selection_boundaries() {
        assert_eq!(bytes_per_entry_for(0).unwrap(), 1);
        assert_eq!(bytes_per_entry_for(1).unwrap(), 1);
        assert_eq!(bytes_per_entry_for(256).unwrap(), 1);
        assert_eq!(bytes_per_entry_for(257).unwrap(), 2);
        assert_eq!(bytes_per_entry_for(65_536).unwrap(), 2);
        assert_eq!(bytes_per_entry_for(65_537).unwrap(), 4);
        assert_eq!(bytes_per_entry_for(i32::MAX as usize).unwrap(), 4);
        let err = bytes_per_entry_for(i32::MAX as usize + 1).unwrap_err();
        assert!(matches!(err, Error::Capacity(_)), "got {:?}", err);
    }

    #[test]
    fn test_codes_start_at_signed_minimum() {
        let dict = OrderedDictionary::from_sorted(vec![10i32, 20, 30]).unwrap();
        assert_eq!(dict.bytes_per_entry(), 1);
        assert_eq!(dict.compress(&10), Some(-128));
        assert_eq!(dict.compress(&20), Some(-127));
        assert_eq!(dict.compress(&30), Some(-126));
        assert_eq!(dict.compress(&15), None);
        assert_eq!(*dict.decompress(-127).unwrap(), 20);
    }

    #[test]
    fn test_monotonicity() {
        let values: Vec<i64> = (0..300).map(|i| i * 7).collect();
        let dict = OrderedDictionary::from_sorted(values.clone()).unwrap();
        assert_eq!(dict.bytes_per_entry(), 2);
        let mut prev = None;
        for v in &values {
            let code = dict.compress(v).unwrap();
            if let Some(p) = prev {
                assert!(code > p, "codes must preserve value order");
            }
            prev = Some(code);
        }
    }

    #[test]
    fn test_varchar_example() {
        let dict = OrderedDictionary::from_sorted(vec![
            "apple".to_string(),
            "banana".to_string(),
            "cherry".to_string(),
        ])
        .unwrap();
        assert_eq!(dict.bytes_per_entry(), 1);
        let banana = dict.compress(&"banana".to_string()).unwrap();
        let cherry = dict.compress(&"cherry".to_string()).unwrap();
        assert!(banana < cherry);
    }

    #[test]
    fn test_compress_lower() {
        let dict = OrderedDictionary::from_sorted(vec![10i32, 20, 30]).unwrap();
        assert_eq!(dict.compress_lower(&5), None);
        assert_eq!(dict.compress_lower(&10), dict.compress(&10));
        assert_eq!(dict.compress_lower(&19), dict.compress(&10));
        assert_eq!(dict.compress_lower(&20), dict.compress(&20));
        assert_eq!(dict.compress_lower(&99), dict.compress(&30));
    }

    #[test]
    fn test_out_of_range_code_is_corrupt() {
        let dict = OrderedDictionary::from_sorted(vec![1i32, 2]).unwrap();
        let err = dict.decompress(0).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)), "got {:?}", err);
        let err = dict.decompress(-126).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)), "got {:?}", err);
    }

    #[test]
    fn test_unsorted_input_rejected() {
        let err = OrderedDictionary::from_sorted(vec![2i32, 1]).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
        let err = OrderedDictionary::from_sorted(vec![1i32, 1]).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn test_float_entries_bit_distinct() {
        // -0.0 and +0.0 are distinct entries under the total order.
        let dict = OrderedDictionary::from_sorted(vec![-0.0f64, 0.0]).unwrap();
        assert_eq!(dict.len(), 2);
        let neg = dict.compress(&-0.0).unwrap();
        let pos = dict.compress(&0.0).unwrap();
        assert!(neg < pos);
    }

    #[test]
    fn test_batch_and_serialize_round_trip() {
        let dict =
            OrderedDictionary::from_sorted(vec![3i16, 9, 27, 81]).unwrap();
        let mut codes = Vec::new();
        dict.compress_batch(&[81, 3, 27], &mut codes).unwrap();
        let mut restored = Vec::new();
        dict.decompress_batch(&codes, &mut restored).unwrap();
        assert_eq!(restored, vec![81, 3, 27]);

        let bytes = dict.serialize().unwrap();
        let loaded = OrderedDictionary::<i16>::deserialize(&bytes).unwrap();
        assert_eq!(loaded, dict);
    }
}
