//! Storage seam for column file I/O.
//!
//! The codec layer never touches `std::fs` directly: bundles, readers, and
//! writers go through this trait pair so the same code runs against a local
//! filesystem, an in-memory store (tests, cache fronting), or a remote
//! implementation provided by the hosting system.
//!
//! ## Traits
//!
//! - `StorageRead`: non-mutating access (random-access open, whole-file
//!   read, size, existence)
//! - `StorageWrite`: mutating operations (append-only create, delete)
//! - `Storage`: marker combining both
//!
//! All I/O is synchronous and blocking; a column file is write-once, so a
//! reader opened after `finish()` observes an immutable byte sequence and
//! needs no coordination with other readers.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::io::{self, BufWriter, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Random-access read handle: anything seekable and readable.
pub trait StorageReader: Read + Seek + Send + Debug {}
impl<T: Read + Seek + Send + Debug> StorageReader for T {}

/// Append-only write handle.
///
/// `finish()` is the durability point: buffered bytes must be observable
/// through `StorageRead` afterwards. Dropping without `finish()` leaves the
/// file in an unspecified partial state (such files are corrupt by
/// definition and must not be advertised to readers).
pub trait StorageAppender: Write + Send {
    fn finish(&mut self) -> Result<()>;
}

/// Read-only storage operations.
pub trait StorageRead: Debug + Send + Sync {
    /// Open a random-access reader over the named file.
    ///
    /// Returns `Error::NotFound` if the file doesn't exist.
    fn open_read(&self, name: &str) -> Result<Box<dyn StorageReader>>;

    /// Read the entire named file into memory.
    fn read_all(&self, name: &str) -> Result<Vec<u8>>;

    /// Size of the named file in bytes.
    fn size(&self, name: &str) -> Result<u64>;

    /// Check whether the named file exists.
    fn exists(&self, name: &str) -> Result<bool>;
}

/// Mutating storage operations.
pub trait StorageWrite: Debug + Send + Sync {
    /// Create (truncating any existing file) an append-only handle.
    fn create_append(&self, name: &str) -> Result<Box<dyn StorageAppender>>;

    /// Delete a file by name.
    ///
    /// Idempotent: deleting a non-existent file succeeds. Only returns an
    /// error for actual failures (permissions, etc).
    fn delete(&self, name: &str) -> Result<()>;
}

/// Marker trait combining read and write capabilities.
pub trait Storage: StorageRead + StorageWrite {}
impl<T: StorageRead + StorageWrite> Storage for T {}

// ============================================================================
// FileStorage
// ============================================================================

/// Local-filesystem storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn map_not_found(name: &str, e: io::Error) -> Error {
        if e.kind() == io::ErrorKind::NotFound {
            Error::not_found(name.to_string())
        } else {
            Error::Io(e)
        }
    }
}

impl StorageRead for FileStorage {
    fn open_read(&self, name: &str) -> Result<Box<dyn StorageReader>> {
        let file = std::fs::File::open(self.resolve(name))
            .map_err(|e| Self::map_not_found(name, e))?;
        Ok(Box::new(file))
    }

    fn read_all(&self, name: &str) -> Result<Vec<u8>> {
        std::fs::read(self.resolve(name)).map_err(|e| Self::map_not_found(name, e))
    }

    fn size(&self, name: &str) -> Result<u64> {
        let meta = std::fs::metadata(self.resolve(name))
            .map_err(|e| Self::map_not_found(name, e))?;
        Ok(meta.len())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.resolve(name).exists())
    }
}

impl StorageWrite for FileStorage {
    fn create_append(&self, name: &str) -> Result<Box<dyn StorageAppender>> {
        let path = self.resolve(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        Ok(Box::new(FileAppender {
            inner: BufWriter::new(file),
        }))
    }

    fn delete(&self, name: &str) -> Result<()> {
        match std::fs::remove_file(self.resolve(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

struct FileAppender {
    inner: BufWriter<std::fs::File>,
}

impl Write for FileAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl StorageAppender for FileAppender {
    fn finish(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

// ============================================================================
// MemoryStorage
// ============================================================================

/// In-memory storage backed by a locked map. Cloning shares the map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all stored files, sorted.
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl StorageRead for MemoryStorage {
    fn open_read(&self, name: &str) -> Result<Box<dyn StorageReader>> {
        // Write-once files: a snapshot taken after finish() is complete.
        let data = self.read_all(name)?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn read_all(&self, name: &str) -> Result<Vec<u8>> {
        self.files
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(name.to_string()))
    }

    fn size(&self, name: &str) -> Result<u64> {
        self.files
            .read()
            .get(name)
            .map(|d| d.len() as u64)
            .ok_or_else(|| Error::not_found(name.to_string()))
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.files.read().contains_key(name))
    }
}

impl StorageWrite for MemoryStorage {
    fn create_append(&self, name: &str) -> Result<Box<dyn StorageAppender>> {
        self.files.write().insert(name.to_string(), Vec::new());
        Ok(Box::new(MemoryAppender {
            files: Arc::clone(&self.files),
            name: name.to_string(),
        }))
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.files.write().remove(name);
        Ok(())
    }
}

struct MemoryAppender {
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    name: String,
}

impl Write for MemoryAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut files = self.files.write();
        match files.get_mut(&self.name) {
            Some(data) => {
                data.extend_from_slice(buf);
                Ok(buf.len())
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file deleted while open for append: {}", self.name),
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl StorageAppender for MemoryAppender {
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::SeekFrom;

    fn check_round_trip(storage: &dyn Storage) {
        let mut appender = storage.create_append("col.dat").unwrap();
        appender.write_all(b"hello ").unwrap();
        appender.write_all(b"world").unwrap();
        appender.finish().unwrap();

        assert!(storage.exists("col.dat").unwrap());
        assert_eq!(storage.size("col.dat").unwrap(), 11);
        assert_eq!(storage.read_all("col.dat").unwrap(), b"hello world");

        let mut reader = storage.open_read("col.dat").unwrap();
        reader.seek(SeekFrom::Start(6)).unwrap();
        let mut buf = [0u8; 5];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"world");

        storage.delete("col.dat").unwrap();
        assert!(!storage.exists("col.dat").unwrap());
        // Idempotent delete
        storage.delete("col.dat").unwrap();
    }

    #[test]
    fn test_memory_storage_round_trip() {
        check_round_trip(&MemoryStorage::new());
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = std::env::temp_dir().join("lamina_test_file_storage");
        let _ = std::fs::remove_dir_all(&dir);
        let storage = FileStorage::new(&dir).unwrap();
        check_round_trip(&storage);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let storage = MemoryStorage::new();
        let err = storage.read_all("nope.dat").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "got {:?}", err);
        let err = storage.open_read("nope.dat").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "got {:?}", err);
    }

    #[test]
    fn test_create_truncates_existing() {
        let storage = MemoryStorage::new();
        let mut a = storage.create_append("x").unwrap();
        a.write_all(b"first").unwrap();
        a.finish().unwrap();

        let mut b = storage.create_append("x").unwrap();
        b.write_all(b"2nd").unwrap();
        b.finish().unwrap();

        assert_eq!(storage.read_all("x").unwrap(), b"2nd");
    }
}
