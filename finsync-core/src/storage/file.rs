//! File-backed key-value backend.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{BackendError, KeyValueBackend};

/// File extension for stored values.
const VALUE_EXTENSION: &str = "json";

/// Stores each key as `<key>.json` in a data directory.
///
/// Writes go to a temporary sibling file which is then renamed over the
/// target, so a reader sees either the old file or the new one.
#[derive(Clone, Debug)]
pub struct FileBackend {
    data_dir: PathBuf,
}

impl FileBackend {
    /// Creates a backend rooted at `data_dir`. The directory is created on
    /// first write.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the full path for a key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.{}", key, VALUE_EXTENSION))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!(".{}.{}.tmp", key, VALUE_EXTENSION))
    }

    /// Rejects keys that would escape the data directory.
    fn validate_key(&self, key: &str) -> Result<(), BackendError> {
        if key.is_empty()
            || key.contains('/')
            || key.contains('\\')
            || key.contains("..")
            || key.starts_with('.')
        {
            return Err(BackendError::IoError(
                self.data_dir.join(key),
                io::Error::new(io::ErrorKind::InvalidInput, "invalid storage key"),
            ));
        }
        Ok(())
    }
}

fn map_write_error(key: &str, path: PathBuf, e: io::Error) -> BackendError {
    if e.kind() == io::ErrorKind::StorageFull {
        BackendError::QuotaExceeded(key.to_string())
    } else {
        BackendError::IoError(path, e)
    }
}

impl KeyValueBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        self.validate_key(key)?;
        let path = self.path(key);

        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BackendError::IoError(path, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        self.validate_key(key)?;

        fs::create_dir_all(&self.data_dir)
            .map_err(|e| map_write_error(key, self.data_dir.clone(), e))?;

        let temp = self.temp_path(key);
        let mut file =
            fs::File::create(&temp).map_err(|e| map_write_error(key, temp.clone(), e))?;
        file.write_all(value.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| {
                let _ = fs::remove_file(&temp);
                map_write_error(key, temp.clone(), e)
            })?;

        let path = self.path(key);
        fs::rename(&temp, &path).map_err(|e| map_write_error(key, path, e))
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.validate_key(key)?;
        let path = self.path(key);

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BackendError::IoError(path, e)),
        }
    }

    fn keys(&self) -> Result<Vec<String>, BackendError> {
        let dir = match fs::read_dir(&self.data_dir) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BackendError::IoError(self.data_dir.clone(), e)),
        };

        let mut keys = Vec::new();
        for entry in dir {
            let entry = entry.map_err(|e| BackendError::IoError(self.data_dir.clone(), e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            if let Some(key) = name.strip_suffix(".json") {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
