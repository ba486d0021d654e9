//! A filesystem store.
//!
//! Every key maps to a file below the base path, with each `/` in the key becoming a directory level.
//! Values are written to a temporary file in the destination directory and then renamed into place,
//! so readers observe either the old or the new value of a key and never a partial one.

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;
use walkdir::WalkDir;

use crate::{
    byte_range::ByteRange,
    storage::{
        Bytes, ListableStorageTraits, ReadableStorageTraits, StorageError, StoreKey, StoreKeys,
        StorePrefix, WritableStorageTraits,
    },
};

/// The file name prefix of in-flight writes. Files with this prefix are never listed.
const TEMPORARY_FILE_PREFIX: &str = ".zarrs_compat.tmp";

/// A filesystem store.
#[derive(Debug)]
pub struct FilesystemStore {
    base_path: PathBuf,
    readonly: bool,
}

/// A filesystem store creation error.
#[derive(Debug, Error)]
pub enum FilesystemStoreCreateError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// An invalid base path.
    #[error("base path {0} is not valid")]
    InvalidBasePath(PathBuf),
}

impl FilesystemStore {
    /// Create a new filesystem store at `base_path`.
    ///
    /// The directory is created on the first write if it does not exist.
    ///
    /// # Errors
    /// Returns a [`FilesystemStoreCreateError`] if `base_path` is not valid UTF-8, points to an existing file rather than a directory, or cannot be accessed.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, FilesystemStoreCreateError> {
        let base_path = base_path.as_ref().to_path_buf();
        if base_path.to_str().is_none() || base_path.is_file() {
            return Err(FilesystemStoreCreateError::InvalidBasePath(base_path));
        }
        let readonly = if base_path.exists() {
            std::fs::metadata(&base_path)?.permissions().readonly()
        } else {
            false
        };
        Ok(Self {
            base_path,
            readonly,
        })
    }

    /// Make the store read only.
    #[must_use]
    pub const fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Returns the base path of the store.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Maps a [`StoreKey`] to a filesystem path.
    #[must_use]
    pub fn key_to_fspath(&self, key: &StoreKey) -> PathBuf {
        self.base_path.join(key.as_str())
    }

    fn prefix_to_fspath(&self, prefix: &StorePrefix) -> PathBuf {
        self.base_path.join(prefix.as_str())
    }

    fn fspath_to_key(&self, path: &Path) -> Option<StoreKey> {
        let relative = pathdiff::diff_paths(path, &self.base_path)?;
        let components = relative
            .components()
            .map(|component| component.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        StoreKey::new(components.join("/")).ok()
    }

    fn is_temporary(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(TEMPORARY_FILE_PREFIX))
    }

    fn ensure_writable(&self) -> Result<(), StorageError> {
        if self.readonly {
            Err(StorageError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

fn not_found_as_none<T>(result: std::io::Result<T>) -> Result<Option<T>, StorageError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

impl ReadableStorageTraits for FilesystemStore {
    fn get_partial_values_key(
        &self,
        key: &StoreKey,
        byte_ranges: &[ByteRange],
    ) -> Result<Option<Vec<Bytes>>, StorageError> {
        let Some(mut file) = not_found_as_none(File::open(self.key_to_fspath(key)))? else {
            return Ok(None);
        };
        let size = file.metadata()?.len();

        let mut out = Vec::with_capacity(byte_ranges.len());
        for byte_range in byte_ranges {
            let range = byte_range.to_range(size)?;
            file.seek(SeekFrom::Start(range.start as u64))?;
            let mut buffer = vec![0; range.len()];
            file.read_exact(&mut buffer)?;
            out.push(Bytes::from(buffer));
        }
        Ok(Some(out))
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        Ok(not_found_as_none(std::fs::metadata(self.key_to_fspath(key)))?
            .map(|metadata| metadata.len()))
    }
}

impl WritableStorageTraits for FilesystemStore {
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError> {
        self.ensure_writable()?;
        let key_path = self.key_to_fspath(key);
        let parent = key_path
            .parent()
            .ok_or_else(|| StorageError::Other(format!("{key} has no parent directory")))?;
        std::fs::create_dir_all(parent)?;

        let mut file = tempfile::Builder::new()
            .prefix(TEMPORARY_FILE_PREFIX)
            .tempfile_in(parent)?;
        file.write_all(&value)?;
        file.as_file().sync_data()?;
        file.persist(&key_path).map_err(|err| err.error)?;
        Ok(())
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.ensure_writable()?;
        not_found_as_none(std::fs::remove_file(self.key_to_fspath(key)))?;
        Ok(())
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        self.ensure_writable()?;
        if prefix.as_str().is_empty() {
            for key in self.list()? {
                self.erase(&key)?;
            }
        } else {
            not_found_as_none(std::fs::remove_dir_all(self.prefix_to_fspath(prefix)))?;
        }
        Ok(())
    }
}

impl ListableStorageTraits for FilesystemStore {
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        let prefix_path = self.prefix_to_fspath(prefix);
        if !prefix_path.is_dir() {
            return Ok(vec![]);
        }
        let mut keys = Vec::new();
        for entry in WalkDir::new(prefix_path).sort_by_file_name() {
            let entry = entry.map_err(|err| StorageError::Other(err.to_string()))?;
            if entry.file_type().is_file() && !Self::is_temporary(entry.path()) {
                if let Some(key) = self.fspath_to_key(entry.path()) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn size_prefix(&self, prefix: &StorePrefix) -> Result<u64, StorageError> {
        let mut size = 0;
        for key in self.list_prefix(prefix)? {
            size += self.size_key(&key)?.unwrap_or_default();
        }
        Ok(size)
    }
}
