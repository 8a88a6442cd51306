//! Error types for lamina crates.

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type.
///
/// Nothing here is auto-recovered inside the codec layer; every variant
/// propagates to the caller, which owns retry policy.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O failure: missing file, permission failure, short read at EOF
    /// mid-record.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Format corruption: invalid length-header byte, negative decoded
    /// length, out-of-range dictionary code, checksum mismatch. Always
    /// fatal to the read operation, never silently repaired.
    #[error("corrupt column file: {0}")]
    Corrupt(String),

    /// Programmer error: writing after finish, family-specific accessor on
    /// the wrong compression type, out-of-order writes to a sort column.
    #[error("usage error: {0}")]
    Usage(String),

    /// Capacity exceeded: dictionary distinct-value count beyond the
    /// widest supported code space.
    #[error("capacity exceeded: {0}")]
    Capacity(String),

    /// A named file in the bundle's file set does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Create a corruption error
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }

    /// Create a usage error
    pub fn usage(msg: impl Into<String>) -> Self {
        Error::Usage(msg.into())
    }

    /// Create a capacity error
    pub fn capacity(msg: impl Into<String>) -> Self {
        Error::Capacity(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }
}
