//! Column and compression type enums.
//!
//! Both enums carry a canonical wire ID used in bundle metadata. All
//! encoders/decoders must use this mapping; variant declaration order is
//! not significant.

use serde::{Deserialize, Serialize};

/// Logical value type of a column.
///
/// `Date`, `Time`, and `Timestamp` are logical aliases: they normalize to
/// `Int64` storage via [`ColumnType::storage_type`] and exist so bundle
/// metadata can round-trip the declared catalog type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Date,
    Time,
    Timestamp,
    VarChar,
    VarBinary,
}

impl ColumnType {
    /// Canonical wire ID for bundle metadata.
    #[inline]
    pub fn to_wire_id(self) -> u8 {
        match self {
            Self::Int8 => 0,
            Self::Int16 => 1,
            Self::Int32 => 2,
            Self::Int64 => 3,
            Self::Float32 => 4,
            Self::Float64 => 5,
            Self::Date => 6,
            Self::Time => 7,
            Self::Timestamp => 8,
            Self::VarChar => 9,
            Self::VarBinary => 10,
        }
    }

    /// Parse from canonical wire ID. Returns `None` for unknown IDs.
    pub fn from_wire_id(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Int8),
            1 => Some(Self::Int16),
            2 => Some(Self::Int32),
            3 => Some(Self::Int64),
            4 => Some(Self::Float32),
            5 => Some(Self::Float64),
            6 => Some(Self::Date),
            7 => Some(Self::Time),
            8 => Some(Self::Timestamp),
            9 => Some(Self::VarChar),
            10 => Some(Self::VarBinary),
            _ => None,
        }
    }

    /// Physical storage type: temporal kinds collapse to `Int64`,
    /// everything else maps to itself.
    #[inline]
    pub fn storage_type(self) -> ColumnType {
        match self {
            Self::Date | Self::Time | Self::Timestamp => Self::Int64,
            other => other,
        }
    }

    /// Encoded width in bits for fixed-width types, `None` for
    /// variable-length types.
    pub fn bits_per_value(self) -> Option<u32> {
        match self.storage_type() {
            Self::Int8 => Some(8),
            Self::Int16 => Some(16),
            Self::Int32 => Some(32),
            Self::Int64 => Some(64),
            Self::Float32 => Some(32),
            Self::Float64 => Some(64),
            Self::VarChar | Self::VarBinary => None,
            // storage_type never returns a temporal kind
            _ => unreachable!(),
        }
    }

    /// True for the length-prefixed variable-length kinds.
    #[inline]
    pub fn is_variable_length(self) -> bool {
        matches!(self, Self::VarChar | Self::VarBinary)
    }
}

/// Compression scheme of a column file.
///
/// `NullSuppress` is accepted for catalog compatibility and dispatched
/// identically to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompressionType {
    None,
    RunLength,
    Dictionary,
    BlockGzip,
    BlockSnappy,
    BlockZstd,
    NullSuppress,
}

impl CompressionType {
    /// Canonical wire ID for bundle metadata.
    #[inline]
    pub fn to_wire_id(self) -> u8 {
        match self {
            Self::None => 0,
            Self::RunLength => 1,
            Self::Dictionary => 2,
            Self::BlockGzip => 3,
            Self::BlockSnappy => 4,
            Self::BlockZstd => 5,
            Self::NullSuppress => 6,
        }
    }

    /// Parse from canonical wire ID. Returns `None` for unknown IDs.
    pub fn from_wire_id(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::None),
            1 => Some(Self::RunLength),
            2 => Some(Self::Dictionary),
            3 => Some(Self::BlockGzip),
            4 => Some(Self::BlockSnappy),
            5 => Some(Self::BlockZstd),
            6 => Some(Self::NullSuppress),
            _ => None,
        }
    }

    /// The scheme actually dispatched: `NullSuppress` collapses to `None`.
    #[inline]
    pub fn effective(self) -> CompressionType {
        match self {
            Self::NullSuppress => Self::None,
            other => other,
        }
    }

    /// True for the chunked general-purpose compression family.
    #[inline]
    pub fn is_block(self) -> bool {
        matches!(self, Self::BlockGzip | Self::BlockSnappy | Self::BlockZstd)
    }

    /// Whether a file set of this scheme carries a position file.
    ///
    /// Plain fixed-width files seek by stride and need none; plain
    /// variable-length, run-length, and block files all need checkpoints.
    pub fn needs_position_file(self, column_type: ColumnType) -> bool {
        match self.effective() {
            Self::None => column_type.is_variable_length(),
            Self::RunLength => true,
            Self::Dictionary => false,
            Self::BlockGzip | Self::BlockSnappy | Self::BlockZstd => true,
            Self::NullSuppress => unreachable!(),
        }
    }

    /// Whether a file set of this scheme carries a dictionary file.
    #[inline]
    pub fn needs_dictionary_file(self) -> bool {
        matches!(self, Self::Dictionary)
    }
}
