//! Blob storage for file bodies.
//!
//! The index only ever identifies files by relative, `/`-separated paths;
//! a [`Storage`] implementation maps those to actual bytes. [`FileStorage`]
//! serves a directory tree on disk, [`MemoryStorage`] backs tests.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use ahash::AHashMap;
use log::warn;
use parking_lot::RwLock;

use crate::error::{FindexError, Result};

/// Read/write access to file bodies by relative path.
pub trait Storage: Send + Sync {
    /// Read a file body. Fails with `Io` when the path cannot be read.
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Create a file with the given body, creating parent directories.
    /// Fails with `AlreadyOnDisk` when the path already exists.
    fn write(&self, path: &str, body: &[u8]) -> Result<()>;

    /// Whether a file exists at the path.
    fn exists(&self, path: &str) -> bool;

    /// Every file path currently stored, relative and `/`-separated.
    fn list(&self) -> Result<Vec<String>>;
}

/// Storage rooted at a base directory on the local filesystem.
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open storage over an existing directory.
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(FindexError::other(format!(
                "storage directory {} does not exist",
                root.display()
            )));
        }
        Ok(FileStorage { root })
    }

    /// The base directory this storage serves.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // Paths come straight off the wire; refuse anything that could escape
    // the base directory.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative.components().any(|component| {
            !matches!(component, Component::Normal(_) | Component::CurDir)
        });
        if escapes || path.is_empty() {
            return Err(FindexError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage path: {path:?}"),
            )));
        }
        Ok(self.root.join(relative))
    }

    fn collect(&self, dir: &Path, out: &mut Vec<String>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                self.collect(&path, out)?;
            } else if path.is_file() {
                let relative = path.strip_prefix(&self.root).unwrap_or(&path);
                match relative.to_str() {
                    Some(text) => out.push(text.replace('\\', "/")),
                    None => warn!("skipping non-UTF-8 path {}", relative.display()),
                }
            }
        }
        Ok(())
    }
}

impl Storage for FileStorage {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.resolve(path)?)?)
    }

    fn write(&self, path: &str, body: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        if full.exists() {
            return Err(FindexError::AlreadyOnDisk);
        }
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, body)?;
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(full) => full.is_file(),
            Err(_) => false,
        }
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        self.collect(&self.root, &mut paths)?;
        paths.sort();
        Ok(paths)
    }
}

/// In-memory storage for tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RwLock<AHashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }

    /// Unconditionally set a file body, overwriting any previous one.
    pub fn put(&self, path: &str, body: &[u8]) {
        self.files.write().insert(path.to_string(), body.to_vec());
    }
}

impl Storage for MemoryStorage {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.files.read().get(path).cloned().ok_or_else(|| {
            FindexError::Io(io::Error::new(io::ErrorKind::NotFound, path.to_string()))
        })
    }

    fn write(&self, path: &str, body: &[u8]) -> Result<()> {
        let mut files = self.files.write();
        if files.contains_key(path) {
            return Err(FindexError::AlreadyOnDisk);
        }
        files.insert(path.to_string(), body.to_vec());
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.files.read().contains_key(path)
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut paths: Vec<String> = self.files.read().keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        storage.write("a/b.txt", b"hello").unwrap();

        assert!(storage.exists("a/b.txt"));
        assert_eq!(storage.read("a/b.txt").unwrap(), b"hello");
        assert_eq!(storage.list().unwrap(), vec!["a/b.txt".to_string()]);
    }

    #[test]
    fn test_memory_storage_no_overwrite() {
        let storage = MemoryStorage::new();
        storage.write("x.txt", b"one").unwrap();
        assert!(matches!(
            storage.write("x.txt", b"two"),
            Err(FindexError::AlreadyOnDisk)
        ));
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        storage.write("sub/file.txt", b"body").unwrap();
        assert!(storage.exists("sub/file.txt"));
        assert_eq!(storage.read("sub/file.txt").unwrap(), b"body");
        assert_eq!(storage.list().unwrap(), vec!["sub/file.txt".to_string()]);

        assert!(matches!(
            storage.write("sub/file.txt", b"again"),
            Err(FindexError::AlreadyOnDisk)
        ));
    }

    #[test]
    fn test_file_storage_rejects_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        assert!(storage.read("../outside.txt").is_err());
        assert!(storage.write("/etc/absolute.txt", b"x").is_err());
        assert!(!storage.exists("../outside.txt"));
    }

    #[test]
    fn test_file_storage_missing_root() {
        assert!(FileStorage::open("/definitely/not/a/real/dir").is_err());
    }
}
