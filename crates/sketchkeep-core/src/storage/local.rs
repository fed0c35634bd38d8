//! Browser `localStorage` implementation for WebAssembly.

use super::{Storage, StorageError, StorageResult};

/// `window.localStorage`-backed storage.
///
/// Not Send/Sync: the storage handle belongs to the page's event loop.
pub struct LocalStorage {
    storage: web_sys::Storage,
}

impl LocalStorage {
    /// Acquire the page's local storage.
    pub fn new() -> StorageResult<Self> {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("No window object".to_string()))?;

        let storage = window
            .local_storage()
            .map_err(|e| StorageError::Unavailable(format!("localStorage error: {:?}", e)))?
            .ok_or_else(|| StorageError::Unavailable("localStorage not available".to_string()))?;

        Ok(Self { storage })
    }
}

impl Storage for LocalStorage {
    fn load(&self, key: &str) -> StorageResult<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|e| StorageError::Other(format!("getItem failed: {:?}", e)))
    }

    fn save(&self, key: &str, contents: &str) -> StorageResult<()> {
        // Throws QuotaExceededError when the origin is out of space.
        self.storage
            .set_item(key, contents)
            .map_err(|e| StorageError::Io(format!("setItem failed: {:?}", e)))
    }
}
