//! The document store boundary.
//!
//! The drawing editor owns the live document. Persistence and transfer only
//! need to read a snapshot, replace the document with a snapshot, and hear
//! about changes.

use crate::snapshot::{Snapshot, SnapshotError};
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use thiserror::Error;

/// Errors raised by a document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The snapshot does not describe a document this store can hold.
    #[error("Invalid snapshot: {0}")]
    Schema(String),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// The hosting editor failed to answer.
    #[error("Document store error: {0}")]
    Host(String),
}

/// A live, in-memory document shared by persistence and transfer actions.
///
/// Access is single-threaded: every call happens on the UI event loop, so
/// implementations use interior mutability rather than locks.
pub trait DocumentStore {
    /// Capture the current document.
    fn get_snapshot(&self) -> Result<Snapshot, StoreError>;

    /// Replace the current document. On error the document is unchanged.
    fn load_snapshot(&self, snapshot: Snapshot) -> Result<(), StoreError>;

    /// Register a change listener. Listeners are called in mutation order
    /// until the returned subscription is released.
    fn subscribe(&self, listener: Box<dyn Fn()>) -> Subscription;
}

/// Handle to a registered change listener.
///
/// Dropping the handle unsubscribes.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Create a subscription that runs `release` when unsubscribed.
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Release the listener now.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Rc<dyn Fn()>)>,
}

/// In-memory document store for tests, native hosts and ephemeral use.
///
/// Accepts snapshots with the editor's `{store, schema}` layout.
pub struct MemoryDocumentStore {
    snapshot: RefCell<Snapshot>,
    listeners: Rc<RefCell<Listeners>>,
}

impl MemoryDocumentStore {
    /// Create a store holding the empty document.
    pub fn new() -> Self {
        Self {
            snapshot: RefCell::new(Snapshot::empty()),
            listeners: Rc::new(RefCell::new(Listeners::default())),
        }
    }

    /// Insert or replace one record, as an editor edit would.
    pub fn put_record(&self, id: &str, record: Value) {
        {
            let mut snapshot = self.snapshot.borrow_mut();
            let mut value = std::mem::take(&mut *snapshot).into_value();
            if let Some(records) = value.get_mut("store").and_then(Value::as_object_mut) {
                records.insert(id.to_string(), record);
            }
            *snapshot = Snapshot::new(value);
        }
        self.notify();
    }

    /// Remove one record. Returns the removed record, if any.
    pub fn remove_record(&self, id: &str) -> Option<Value> {
        let removed = {
            let mut snapshot = self.snapshot.borrow_mut();
            let mut value = std::mem::take(&mut *snapshot).into_value();
            let removed = value
                .get_mut("store")
                .and_then(Value::as_object_mut)
                .and_then(|records| records.remove(id));
            *snapshot = Snapshot::new(value);
            removed
        };
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    /// Number of records in the current document.
    pub fn len(&self) -> usize {
        self.snapshot.borrow().records().map_or(0, |r| r.len())
    }

    /// Check if the current document has no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }

    fn notify(&self) {
        // Clone first so listeners may unsubscribe while being called.
        let listeners: Vec<Rc<dyn Fn()>> = self
            .listeners
            .borrow()
            .entries
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener();
        }
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get_snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(self.snapshot.borrow().clone())
    }

    fn load_snapshot(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        validate(&snapshot)?;
        *self.snapshot.borrow_mut() = snapshot;
        self.notify();
        Ok(())
    }

    fn subscribe(&self, listener: Box<dyn Fn()>) -> Subscription {
        let id = {
            let mut listeners = self.listeners.borrow_mut();
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.push((id, Rc::from(listener)));
            id
        };

        let listeners: Weak<RefCell<Listeners>> = Rc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.borrow_mut().entries.retain(|(entry, _)| *entry != id);
            }
        })
    }
}

fn validate(snapshot: &Snapshot) -> Result<(), StoreError> {
    let value = snapshot.value();
    if !value.is_object() {
        return Err(StoreError::Schema("snapshot must be an object".to_string()));
    }
    if snapshot.records().is_none() {
        return Err(StoreError::Schema(
            "missing or invalid \"store\" record map".to_string(),
        ));
    }
    if !value.get("schema").is_some_and(Value::is_object) {
        return Err(StoreError::Schema(
            "missing or invalid \"schema\" description".to_string(),
        ));
    }
    Ok(())
}
