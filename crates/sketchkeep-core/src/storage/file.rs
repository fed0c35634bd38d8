//! File-based storage implementation for native platforms.

use super::{Storage, StorageError, StorageResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File-based storage for native platforms.
///
/// Each key is one `<key>.json` file in a base directory.
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new file storage with the given base directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Create file storage in the default location.
    ///
    /// On Unix: `~/.local/share/sketchkeep/`
    /// On Windows: `%LOCALAPPDATA%\sketchkeep\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Unavailable("Could not determine home directory".to_string()))?;

        Self::new(base.join("sketchkeep"))
    }

    /// Get the file path for a key.
    fn key_path(&self, key: &str) -> PathBuf {
        let safe_key: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.json", safe_key))
    }

    /// Get the base path.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Storage for FileStorage {
    fn load(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.key_path(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn save(&self, key: &str, contents: &str) -> StorageResult<()> {
        let path = self.key_path(key);
        // Write then rename so a crash never leaves a half-written slot.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(|e| {
            StorageError::Io(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, &path).map_err(|e| {
            StorageError::Io(format!("Failed to replace {}: {}", path.display(), e))
        })
    }
}
