//! In-memory storage implementation.

use super::{Storage, StorageResult};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// In-memory storage for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<String, String>>,
    writes: Cell<usize>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage with one key already written.
    pub fn with_entry(key: &str, contents: &str) -> Self {
        let storage = Self::new();
        storage
            .entries
            .borrow_mut()
            .insert(key.to_string(), contents.to_string());
        storage
    }

    /// Current text under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    /// Number of successful `save` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.get(key))
    }

    fn save(&self, key: &str, contents: &str) -> StorageResult<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), contents.to_string());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}
