//! `ColumnValue` implementations for the variable-length kinds.
//!
//! Both use the length-prefixed wire encoding; `String` additionally
//! validates UTF-8 on decode (invalid bytes are corruption, not a panic).

use super::ColumnValue;
use lamina_core::error::{Error, Result};
use lamina_core::wire;
use std::cmp::Ordering;
use std::io::{Read, Write};

impl ColumnValue for Vec<u8> {
    type Key = Vec<u8>;

    const FIXED_BITS: Option<u32> = None;

    #[inline]
    fn encoded_len(&self) -> u64 {
        wire::len_prefixed_size(self.len() as u64)
    }

    fn write_to(&self, w: &mut impl Write) -> Result<()> {
        wire::write_len_prefixed(w, self)
    }

    fn read_from(r: &mut impl Read) -> Result<Self> {
        wire::read_len_prefixed(r)
    }

    #[inline]
    fn total_cmp(&self, other: &Self) -> Ordering {
        Ord::cmp(self, other)
    }

    fn to_key(&self) -> Self::Key {
        self.clone()
    }
}

impl ColumnValue for String {
    type Key = String;

    const FIXED_BITS: Option<u32> = None;

    #[inline]
    fn encoded_len(&self) -> u64 {
        wire::len_prefixed_size(self.len() as u64)
    }

    fn write_to(&self, w: &mut impl Write) -> Result<()> {
        wire::write_len_prefixed(w, self.as_bytes())
    }

    fn read_from(r: &mut impl Read) -> Result<Self> {
        let bytes = wire::read_len_prefixed(r)?;
        String::from_utf8(bytes)
            .map_err(|e| Error::corrupt(format!("invalid UTF-8 in varchar value: {}", e)))
    }

    #[inline]
    fn total_cmp(&self, other: &Self) -> Ordering {
        Ord::cmp(self, other)
    }

    fn to_key(&self) -> Self::Key {
        self.clone()
    }
}
