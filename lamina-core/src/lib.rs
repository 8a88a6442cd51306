//! # Lamina Core
//!
//! Shared leaf types for the lamina column-file engine.
//!
//! This crate provides:
//! - `ColumnType` / `CompressionType` enums with their wire IDs
//! - The crate error taxonomy (`Error`, `Result`)
//! - The synchronous storage seam (`StorageRead`, `StorageWrite`) with
//!   filesystem and in-memory implementations
//! - The raw wire codec: big-endian fixed-width primitives and the
//!   length-prefixed variable-length encoding
//!
//! The codec families, indexes, dictionaries, and bundle orchestration live
//! in `lamina-colfile`, which depends on this crate.

pub mod error;
pub mod storage;
pub mod types;
pub mod wire;

pub use error::{Error, Result};
pub use storage::{
    FileStorage, MemoryStorage, Storage, StorageAppender, StorageRead, StorageReader,
    StorageWrite,
};
pub use types::{ColumnType, CompressionType};
