//! SketchKeep Core Library
//!
//! Platform-agnostic persistence for a drawing canvas whose editor lives
//! elsewhere: the document store is consumed through a small trait, its
//! snapshot is kept in a durable key-value slot with a debounced autosave,
//! and the user can reset, export or import the document as a JSON file.

pub mod debounce;
pub mod document;
pub mod menu;
pub mod persistence;
pub mod snapshot;
pub mod storage;
pub mod transfer;

#[cfg(test)]
mod test_util;

pub use debounce::{Clock, DebounceTimer, ManualClock, SystemClock};
pub use document::{DocumentStore, MemoryDocumentStore, StoreError, Subscription};
pub use menu::{MenuAction, MenuDescriptor, MenuItem, MenuLabels};
pub use persistence::{
    PersistenceConfig, PersistenceController, PersistenceError, PersistenceResult,
    ReadinessState, StartupError, TeardownPolicy, DEFAULT_DEBOUNCE_MS, DEFAULT_SLOT_KEY,
};
pub use snapshot::{Snapshot, SnapshotError};
pub use transfer::{
    Delivery, ExportOutcome, FileArtifact, FileContent, FileFilter, FilePick, FilePicker,
    FileSink, ImportOutcome, TransferActions, TransferError, TransferResult, EXPORT_FILE_NAME,
    EXPORT_MIME_TYPE,
};

use std::future::Future;
use std::pin::Pin;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;
