//! Durable key-value storage for the autosave slot.
//!
//! The browser backs this with `localStorage`; native builds keep one JSON
//! file per key. Reads and writes are synchronous, like `localStorage`.

mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod file;

#[cfg(target_arch = "wasm32")]
mod local;

pub use memory::MemoryStorage;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStorage;

#[cfg(target_arch = "wasm32")]
pub use local::LocalStorage;

use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// A durable string-keyed text store.
///
/// A single key of it is the autosave slot: read once at startup and
/// overwritten on every debounced change. Nothing here deletes a key.
pub trait Storage {
    /// Read the text stored under `key`, `None` if nothing was ever written.
    fn load(&self, key: &str) -> StorageResult<Option<String>>;

    /// Overwrite the text stored under `key`.
    fn save(&self, key: &str, contents: &str) -> StorageResult<()>;
}

/// Create a platform-appropriate storage backend.
#[cfg(not(target_arch = "wasm32"))]
pub fn create_default_storage() -> StorageResult<FileStorage> {
    FileStorage::default_location()
}

#[cfg(target_arch = "wasm32")]
pub fn create_default_storage() -> StorageResult<LocalStorage> {
    LocalStorage::new()
}

/// Convenience type alias for platform-specific storage.
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformStorage = FileStorage;

#[cfg(target_arch = "wasm32")]
pub type PlatformStorage = LocalStorage;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let errors = [
            StorageError::Io("disk full".to_string()),
            StorageError::Unavailable("private mode".to_string()),
            StorageError::Other("getItem failed".to_string()),
        ];
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            [
                "IO error: disk full",
                "Storage unavailable: private mode",
                "Storage error: getItem failed",
            ]
        );
    }
}
