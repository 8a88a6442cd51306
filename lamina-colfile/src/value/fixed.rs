//! `ColumnValue` implementations for the fixed-width numeric kinds.
//!
//! Batch paths stage up to [`CHUNK_VALUES`] values per `read`/`write` call
//! in a byte buffer rather than issuing one I/O call per value.

use super::ColumnValue;
use lamina_core::error::Result;
use lamina_core::wire;
use std::cmp::Ordering;
use std::io::{Read, Write};

/// Values staged per I/O call in the batch paths.
const CHUNK_VALUES: usize = 4096;

macro_rules! fixed_batch_paths {
    ($ty:ty, $width:expr) => {
        fn write_slice(values: &[Self], w: &mut impl Write) -> Result<()> {
            let mut buf: Vec<u8> = Vec::with_capacity(CHUNK_VALUES.min(values.len()) * $width);
            for chunk in values.chunks(CHUNK_VALUES) {
                buf.clear();
                for v in chunk {
                    buf.extend_from_slice(&v.to_be_bytes());
                }
                w.write_all(&buf)?;
            }
            Ok(())
        }

        fn read_slice(r: &mut impl Read, out: &mut [Self]) -> Result<()> {
            let mut buf = vec![0u8; CHUNK_VALUES.min(out.len().max(1)) * $width];
            for chunk in out.chunks_mut(CHUNK_VALUES) {
                let byte_count = chunk.len() * $width;
                r.read_exact(&mut buf[..byte_count])?;
                for (j, slot) in chunk.iter_mut().enumerate() {
                    let off = j * $width;
                    *slot = <$ty>::from_be_bytes(buf[off..off + $width].try_into().unwrap());
                }
            }
            Ok(())
        }
    };
}

macro_rules! impl_int_value {
    ($ty:ty, $bits:expr, $width:expr) => {
        impl ColumnValue for $ty {
            type Key = $ty;

            const FIXED_BITS: Option<u32> = Some($bits);

            #[inline]
            fn encoded_len(&self) -> u64 {
                $width
            }

            #[inline]
            fn write_to(&self, w: &mut impl Write) -> Result<()> {
                w.write_all(&self.to_be_bytes())?;
                Ok(())
            }

            #[inline]
            fn read_from(r: &mut impl Read) -> Result<Self> {
                Ok(<$ty>::from_be_bytes(wire::read_array(r)?))
            }

            fixed_batch_paths!($ty, $width);

            #[inline]
            fn total_cmp(&self, other: &Self) -> Ordering {
                Ord::cmp(self, other)
            }

            #[inline]
            fn to_key(&self) -> Self::Key {
                *self
            }
        }
    };
}

macro_rules! impl_float_value {
    ($ty:ty, $bits:expr, $width:expr, $key_ty:ty) => {
        impl ColumnValue for $ty {
            /// Raw bit pattern: the key relation matches `total_cmp`
            /// equality, so `-0.0` and `+0.0` stay distinct entries.
            type Key = $key_ty;

            const FIXED_BITS: Option<u32> = Some($bits);

            #[inline]
            fn encoded_len(&self) -> u64 {
                $width
            }

            #[inline]
            fn write_to(&self, w: &mut impl Write) -> Result<()> {
                w.write_all(&self.to_be_bytes())?;
                Ok(())
            }

            #[inline]
            fn read_from(r: &mut impl Read) -> Result<Self> {
                Ok(<$ty>::from_be_bytes(wire::read_array(r)?))
            }

            fixed_batch_paths!($ty, $width);

            #[inline]
            fn total_cmp(&self, other: &Self) -> Ordering {
                <$ty>::total_cmp(self, other)
            }

            #[inline]
            fn to_key(&self) -> Self::Key {
                self.to_bits()
            }
        }
    };
}

impl_int_value!(i8, 8, 1);
impl_int_value!(i16, 16, 2);
impl_int_value!(i32, 32, 4);
impl_int_value!(i64, 64, 8);
impl_float_value!(f32, 32, 4, u32);
impl_float_value!(f64, 64, 8, u64);

#[cfg(test)]
mod tests {
    use super::super::ColumnValue;
    use std::io::Cursor;

    #[test]
    fn test_slice_round_trip_spans_chunks() {
        // More values than one staging chunk to exercise the refill path.
        let values: Vec<i32> = (0..10_000).map(|i| i * 3 - 5000).collect();
        let mut buf = Vec::new();
        i32::write_slice(&values, &mut buf).unwrap();
        assert_eq!(buf.len(), values.len() * 4);

        let mut out = vec![0i32; values.len()];
        i32::read_slice(&mut Cursor::new(&buf), &mut out).unwrap();
        assert_eq!(out, values);
    }

    #[test]
    fn test_single_value_round_trip() {
        let mut buf = Vec::new();
        (-7i8).write_to(&mut buf).unwrap();
        i16::MIN.write_to(&mut buf).unwrap();
        f64::NEG_INFINITY.write_to(&mut buf).unwrap();

        let mut r = Cursor::new(&buf);
        assert_eq!(i8::read_from(&mut r).unwrap(), -7);
        assert_eq!(i16::read_from(&mut r).unwrap(), i16::MIN);
        assert_eq!(f64::read_from(&mut r).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_float_total_order() {
        use std::cmp::Ordering;
        assert_eq!((-0.0f64).total_cmp(&0.0), Ordering::Less);
        assert_eq!(ColumnValue::total_cmp(&-0.0f64, &0.0), Ordering::Less);
        assert!(ColumnValue::value_eq(&f32::NAN, &f32::NAN));
        assert!(!ColumnValue::value_eq(&-0.0f32, &0.0f32));
    }

    #[test]
    fn test_float_slice_bit_exact() {
        let values = vec![f64::NAN, -0.0, 0.0, f64::INFINITY, 1.0e-300];
        let mut buf = Vec::new();
        f64::write_slice(&values, &mut buf).unwrap();
        let mut out = vec![0.0f64; values.len()];
        f64::read_slice(&mut Cursor::new(&buf), &mut out).unwrap();
        for (a, b) in values.iter().zip(&out) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_short_read_is_io_error() {
        let buf = [0u8; 6]; // not enough for two i32s... only 1.5
        let mut out = [0i32; 2];
        let err = i32::read_slice(&mut Cursor::new(&buf), &mut out).unwrap_err();
        assert!(matches!(err, lamina_core::Error::Io(_)), "got {:?}", err);
    }
}
