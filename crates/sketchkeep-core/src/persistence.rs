//! Load-on-start and debounced autosave of the document snapshot.
//!
//! Lifecycle: `initialize` once when the editor mounts, `start_auto_save`
//! once it reports `Ready`, `maybe_save` on every event-loop tick, `stop`
//! when the editor unmounts.

use crate::debounce::{Clock, DebounceTimer, SystemClock};
use crate::document::{DocumentStore, StoreError, Subscription};
use crate::snapshot::{Snapshot, SnapshotError};
use crate::storage::{Storage, StorageError};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;

/// Default autosave slot key.
pub const DEFAULT_SLOT_KEY: &str = "tldraw-local_storage";

/// Default debounce window in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// What `stop` does with a write that is still waiting for its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownPolicy {
    /// Drop it. At most one window of edits is lost.
    #[default]
    Discard,
    /// Write it before releasing the subscription.
    Flush,
}

/// Persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Storage key of the autosave slot.
    pub slot_key: String,
    /// Quiescence window before a change is written.
    #[serde(rename = "debounce_ms", with = "millis")]
    pub debounce: Duration,
    pub teardown: TeardownPolicy,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            slot_key: DEFAULT_SLOT_KEY.to_string(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            teardown: TeardownPolicy::Discard,
        }
    }
}

impl PersistenceConfig {
    pub fn with_slot_key(mut self, key: impl Into<String>) -> Self {
        self.slot_key = key.into();
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_teardown(mut self, teardown: TeardownPolicy) -> Self {
        self.teardown = teardown;
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Startup status shown by the hosting UI: a loading view, the editor, or
/// a terminal error view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum ReadinessState {
    Loading,
    Ready,
    #[serde(rename = "error")]
    Failed(String),
}

impl ReadinessState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// The failure message, if startup failed.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Why the autosave slot could not be restored.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Persistence errors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Autosave requires a ready document, state is {0:?}")]
    NotReady(ReadinessState),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Bridges a document store and its durable autosave slot.
pub struct PersistenceController<D: DocumentStore, S: Storage, C: Clock = SystemClock> {
    store: Rc<D>,
    storage: Rc<S>,
    config: PersistenceConfig,
    state: ReadinessState,
    timer: Rc<RefCell<DebounceTimer<C>>>,
    subscription: Option<Subscription>,
    writes: u64,
    write_failures: u64,
}

impl<D: DocumentStore, S: Storage> PersistenceController<D, S, SystemClock> {
    /// Create a controller driven by the system clock.
    pub fn new(store: Rc<D>, storage: Rc<S>, config: PersistenceConfig) -> Self {
        Self::with_clock(store, storage, config, SystemClock)
    }
}

impl<D: DocumentStore, S: Storage, C: Clock + 'static> PersistenceController<D, S, C> {
    /// Create a controller with an explicit clock.
    pub fn with_clock(store: Rc<D>, storage: Rc<S>, config: PersistenceConfig, clock: C) -> Self {
        let timer = DebounceTimer::new(config.debounce, clock);
        Self {
            store,
            storage,
            config,
            state: ReadinessState::Loading,
            timer: Rc::new(RefCell::new(timer)),
            subscription: None,
            writes: 0,
            write_failures: 0,
        }
    }

    /// Restore the document from the autosave slot.
    ///
    /// One attempt, no retry. An empty slot is a fresh install and leaves
    /// the store alone. Unreadable or unparsable content is terminal for the
    /// session: the store is left alone and autosave is refused, so the bad
    /// slot is never overwritten by an empty document.
    pub fn initialize(&mut self) -> &ReadinessState {
        if self.subscription.is_some() {
            self.release(TeardownPolicy::Discard);
        }
        self.state = ReadinessState::Loading;

        self.state = match self.restore() {
            Ok(true) => {
                log::info!("Restored document from '{}'", self.config.slot_key);
                ReadinessState::Ready
            }
            Ok(false) => {
                log::info!("Nothing persisted under '{}', starting empty", self.config.slot_key);
                ReadinessState::Ready
            }
            Err(e) => {
                log::error!("Failed to restore document: {}", e);
                ReadinessState::Failed(e.to_string())
            }
        };
        &self.state
    }

    fn restore(&self) -> Result<bool, StartupError> {
        let persisted = self.storage.load(&self.config.slot_key)?;
        let Some(text) = persisted.filter(|text| !text.is_empty()) else {
            return Ok(false);
        };
        let snapshot = Snapshot::from_json(&text)?;
        self.store.load_snapshot(snapshot)?;
        Ok(true)
    }

    /// Subscribe to document changes and debounce them into slot writes.
    ///
    /// Calling it again while subscribed is a no-op.
    pub fn start_auto_save(&mut self) -> PersistenceResult<()> {
        if !self.state.is_ready() {
            return Err(PersistenceError::NotReady(self.state.clone()));
        }
        if self.subscription.is_some() {
            return Ok(());
        }

        let timer = Rc::downgrade(&self.timer);
        self.subscription = Some(self.store.subscribe(Box::new(move || {
            if let Some(timer) = timer.upgrade() {
                timer.borrow_mut().schedule();
            }
        })));
        log::debug!(
            "Autosave started ({} ms window)",
            self.config.debounce.as_millis()
        );
        Ok(())
    }

    /// Write the latest snapshot if the debounce window has elapsed.
    ///
    /// Returns `Ok(false)` when no write was due. A failed write is logged
    /// and counted; the next change schedules a fresh attempt.
    pub fn maybe_save(&mut self) -> PersistenceResult<bool> {
        let due = self.timer.borrow_mut().take_due();
        if !due {
            return Ok(false);
        }
        self.write().map(|()| true)
    }

    /// Write now if a write is pending, without waiting for the window.
    pub fn flush(&mut self) -> PersistenceResult<bool> {
        let pending = self.timer.borrow_mut().flush_if_pending();
        if !pending {
            return Ok(false);
        }
        self.write().map(|()| true)
    }

    /// Release the change subscription and apply the teardown policy to a
    /// pending write.
    pub fn stop(&mut self) {
        self.release(self.config.teardown);
    }

    fn release(&mut self, policy: TeardownPolicy) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        match policy {
            TeardownPolicy::Discard => {
                if self.timer.borrow_mut().cancel() {
                    log::debug!("Discarded pending autosave on teardown");
                }
            }
            TeardownPolicy::Flush => {
                if let Err(e) = self.flush() {
                    log::warn!("Autosave flush on teardown failed: {}", e);
                }
            }
        }
    }

    fn write(&mut self) -> PersistenceResult<()> {
        let result = self.write_snapshot();
        match &result {
            Ok(()) => self.writes += 1,
            Err(e) => {
                self.write_failures += 1;
                log::error!("Autosave to '{}' failed: {}", self.config.slot_key, e);
            }
        }
        result
    }

    fn write_snapshot(&self) -> PersistenceResult<()> {
        let snapshot = self.store.get_snapshot()?;
        let json = snapshot.to_json()?;
        self.storage.save(&self.config.slot_key, &json)?;
        log::debug!("Autosaved {} bytes to '{}'", json.len(), self.config.slot_key);
        Ok(())
    }

    /// Current startup status.
    pub fn state(&self) -> &ReadinessState {
        &self.state
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    /// Whether change notifications are being observed.
    pub fn is_auto_saving(&self) -> bool {
        self.subscription.is_some()
    }

    /// Whether a write is waiting for its window.
    pub fn is_save_pending(&self) -> bool {
        self.timer.borrow().is_pending()
    }

    /// Time until the pending write becomes due, for hosts that arm a timer.
    pub fn time_until_save(&self) -> Option<Duration> {
        self.timer.borrow().remaining()
    }

    /// Successful slot writes so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Failed slot writes so far.
    pub fn write_failures(&self) -> u64 {
        self.write_failures
    }

    pub fn store(&self) -> &Rc<D> {
        &self.store
    }

    pub fn storage(&self) -> &Rc<S> {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debounce::ManualClock;
    use crate::document::MemoryDocumentStore;
    use crate::storage::{MemoryStorage, StorageResult};
    use serde_json::json;

    const WINDOW: Duration = Duration::from_millis(DEFAULT_DEBOUNCE_MS);

    type Controller = PersistenceController<MemoryDocumentStore, MemoryStorage, ManualClock>;

    fn controller_with(storage: MemoryStorage, config: PersistenceConfig) -> (Controller, ManualClock) {
        let clock = ManualClock::new();
        let controller = PersistenceController::with_clock(
            Rc::new(MemoryDocumentStore::new()),
            Rc::new(storage),
            config,
            clock.clone(),
        );
        (controller, clock)
    }

    fn ready_controller() -> (Controller, ManualClock) {
        let (mut controller, clock) = controller_with(MemoryStorage::new(), PersistenceConfig::default());
        assert!(controller.initialize().is_ready());
        controller.start_auto_save().unwrap();
        (controller, clock)
    }

    fn persisted(controller: &Controller) -> Option<Snapshot> {
        controller
            .storage()
            .get(DEFAULT_SLOT_KEY)
            .map(|text| Snapshot::from_json(&text).unwrap())
    }

    #[test]
    fn test_starts_loading() {
        let (controller, _) = controller_with(MemoryStorage::new(), PersistenceConfig::default());
        assert_eq!(controller.state(), &ReadinessState::Loading);
    }

    #[test]
    fn test_empty_slot_is_ready_with_default_store() {
        let (mut controller, _) = controller_with(MemoryStorage::new(), PersistenceConfig::default());

        assert_eq!(controller.initialize(), &ReadinessState::Ready);
        assert_eq!(controller.store().get_snapshot().unwrap(), Snapshot::empty());
        assert_eq!(controller.storage().write_count(), 0);
    }

    #[test]
    fn test_empty_string_slot_is_fresh_install() {
        let storage = MemoryStorage::with_entry(DEFAULT_SLOT_KEY, "");
        let (mut controller, _) = controller_with(storage, PersistenceConfig::default());

        assert!(controller.initialize().is_ready());
    }

    #[test]
    fn test_restores_persisted_snapshot() {
        let saved = Snapshot::template().unwrap();
        let storage = MemoryStorage::with_entry(DEFAULT_SLOT_KEY, &saved.to_json().unwrap());
        let (mut controller, _) = controller_with(storage, PersistenceConfig::default());

        assert!(controller.initialize().is_ready());
        assert_eq!(controller.store().get_snapshot().unwrap(), saved);
    }

    #[test]
    fn test_malformed_slot_fails_and_leaves_store_untouched() {
        let storage = MemoryStorage::with_entry(DEFAULT_SLOT_KEY, "{not json");
        let (mut controller, _) = controller_with(storage, PersistenceConfig::default());

        let state = controller.initialize().clone();
        let message = state.error().expect("startup should fail");
        assert!(!message.is_empty());
        assert_eq!(controller.store().get_snapshot().unwrap(), Snapshot::empty());

        assert!(matches!(
            controller.start_auto_save(),
            Err(PersistenceError::NotReady(ReadinessState::Failed(_)))
        ));
        assert!(!controller.is_auto_saving());
        assert_eq!(controller.storage().get(DEFAULT_SLOT_KEY).as_deref(), Some("{not json"));
    }

    #[test]
    fn test_schema_rejection_fails_startup() {
        let storage = MemoryStorage::with_entry(DEFAULT_SLOT_KEY, "[1, 2, 3]");
        let (mut controller, _) = controller_with(storage, PersistenceConfig::default());

        assert!(matches!(controller.initialize(), ReadinessState::Failed(_)));
    }

    #[test]
    fn test_unreadable_slot_fails_startup() {
        struct Broken;
        impl Storage for Broken {
            fn load(&self, _key: &str) -> StorageResult<Option<String>> {
                Err(StorageError::Unavailable("denied".to_string()))
            }
            fn save(&self, _key: &str, _contents: &str) -> StorageResult<()> {
                Ok(())
            }
        }

        let mut controller = PersistenceController::with_clock(
            Rc::new(MemoryDocumentStore::new()),
            Rc::new(Broken),
            PersistenceConfig::default(),
            ManualClock::new(),
        );
        assert_eq!(
            controller.initialize().error(),
            Some("Storage unavailable: denied")
        );
    }

    #[test]
    fn test_autosave_requires_initialize() {
        let (mut controller, _) = controller_with(MemoryStorage::new(), PersistenceConfig::default());
        assert!(matches!(
            controller.start_auto_save(),
            Err(PersistenceError::NotReady(ReadinessState::Loading))
        ));
    }

    #[test]
    fn test_start_auto_save_is_idempotent() {
        let (mut controller, _) = ready_controller();
        controller.start_auto_save().unwrap();
        assert_eq!(controller.store().listener_count(), 1);
    }

    #[test]
    fn test_burst_collapses_into_one_write_of_latest() {
        let (mut controller, clock) = ready_controller();
        let store = controller.store().clone();

        for i in 0..20 {
            store.put_record("shape:drag", json!({ "id": "shape:drag", "x": i }));
            clock.advance(Duration::from_millis(20));
            assert!(!controller.maybe_save().unwrap());
        }
        assert_eq!(controller.storage().write_count(), 0);

        clock.advance(WINDOW);
        assert!(controller.maybe_save().unwrap());
        assert!(!controller.maybe_save().unwrap());

        assert_eq!(controller.storage().write_count(), 1);
        assert_eq!(persisted(&controller), Some(store.get_snapshot().unwrap()));
        assert_eq!(
            persisted(&controller).unwrap().records().unwrap()["shape:drag"]["x"],
            json!(19)
        );
    }

    #[test]
    fn test_write_takes_snapshot_at_fire_time() {
        let (mut controller, clock) = ready_controller();
        let store = controller.store().clone();

        store.put_record("shape:a", json!({ "v": 1 }));
        clock.advance(WINDOW);
        assert!(controller.maybe_save().unwrap());

        store.put_record("shape:a", json!({ "v": 2 }));
        clock.advance(WINDOW);
        assert!(controller.maybe_save().unwrap());

        assert_eq!(controller.writes(), 2);
        assert_eq!(persisted(&controller).unwrap().records().unwrap()["shape:a"], json!({ "v": 2 }));
    }

    #[test]
    fn test_stop_discards_pending_write() {
        let (mut controller, clock) = ready_controller();
        let store = controller.store().clone();

        store.put_record("shape:a", json!({}));
        assert!(controller.is_save_pending());
        controller.stop();

        clock.advance(WINDOW * 2);
        assert!(!controller.maybe_save().unwrap());
        assert_eq!(controller.storage().write_count(), 0);
        assert_eq!(store.listener_count(), 0);

        store.put_record("shape:b", json!({}));
        assert!(!controller.is_save_pending());
    }

    #[test]
    fn test_stop_with_flush_policy_writes_pending() {
        let config = PersistenceConfig::default().with_teardown(TeardownPolicy::Flush);
        let (mut controller, _) = controller_with(MemoryStorage::new(), config);
        controller.initialize();
        controller.start_auto_save().unwrap();

        controller.store().put_record("shape:a", json!({}));
        controller.stop();

        assert_eq!(controller.storage().write_count(), 1);
        assert_eq!(persisted(&controller), Some(controller.store().get_snapshot().unwrap()));
    }

    #[test]
    fn test_flush_writes_before_deadline() {
        let (mut controller, _) = ready_controller();
        assert!(!controller.flush().unwrap());

        controller.store().put_record("shape:a", json!({}));
        assert!(controller.flush().unwrap());
        assert!(!controller.is_save_pending());
        assert_eq!(controller.storage().write_count(), 1);
    }

    #[test]
    fn test_loaded_snapshot_is_persisted_after_window() {
        let (mut controller, clock) = ready_controller();
        let template = Snapshot::template().unwrap();

        controller.store().load_snapshot(template.clone()).unwrap();
        assert_eq!(controller.time_until_save(), Some(WINDOW));

        clock.advance(WINDOW);
        assert!(controller.maybe_save().unwrap());
        assert_eq!(persisted(&controller), Some(template));
    }

    #[test]
    fn test_write_failure_is_reported_not_fatal() {
        struct Full;
        impl Storage for Full {
            fn load(&self, _key: &str) -> StorageResult<Option<String>> {
                Ok(None)
            }
            fn save(&self, _key: &str, _contents: &str) -> StorageResult<()> {
                Err(StorageError::Io("QuotaExceededError".to_string()))
            }
        }

        let clock = ManualClock::new();
        let mut controller = PersistenceController::with_clock(
            Rc::new(MemoryDocumentStore::new()),
            Rc::new(Full),
            PersistenceConfig::default(),
            clock.clone(),
        );
        controller.initialize();
        controller.start_auto_save().unwrap();

        controller.store().put_record("shape:a", json!({}));
        clock.advance(WINDOW);
        assert!(matches!(controller.maybe_save(), Err(PersistenceError::Storage(_))));
        assert_eq!(controller.write_failures(), 1);
        assert!(controller.state().is_ready());
        assert!(controller.is_auto_saving());

        controller.store().put_record("shape:b", json!({}));
        assert!(controller.is_save_pending());
    }

    #[test]
    fn test_reinitialize_releases_subscription() {
        let (mut controller, _) = ready_controller();
        controller.store().put_record("shape:a", json!({}));

        assert!(controller.initialize().is_ready());
        assert!(!controller.is_auto_saving());
        assert!(!controller.is_save_pending());
    }

    #[test]
    fn test_custom_slot_key() {
        let config = PersistenceConfig::default().with_slot_key("board");
        let (mut controller, clock) = controller_with(MemoryStorage::new(), config);
        controller.initialize();
        controller.start_auto_save().unwrap();

        controller.store().put_record("shape:a", json!({}));
        clock.advance(WINDOW);
        controller.maybe_save().unwrap();

        assert!(controller.storage().get("board").is_some());
        assert!(controller.storage().get(DEFAULT_SLOT_KEY).is_none());
    }

    #[test]
    fn test_config_serde() {
        let config: PersistenceConfig =
            serde_json::from_str(r#"{"debounce_ms": 250, "teardown": "flush"}"#).unwrap();
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.teardown, TeardownPolicy::Flush);
        assert_eq!(config.slot_key, DEFAULT_SLOT_KEY);
    }

    #[test]
    fn test_config_debounce_saturates() {
        let config = PersistenceConfig::default().with_debounce(Duration::MAX);
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["debounce_ms"], json!(u64::MAX));

        let config = PersistenceConfig::default().with_debounce(Duration::from_millis(750));
        assert_eq!(serde_json::to_value(&config).unwrap()["debounce_ms"], json!(750));
    }

    #[test]
    fn test_readiness_json_shape() {
        assert_eq!(
            serde_json::to_value(ReadinessState::Loading).unwrap(),
            json!({ "status": "loading" })
        );
        assert_eq!(
            serde_json::to_value(ReadinessState::Ready).unwrap(),
            json!({ "status": "ready" })
        );
        assert_eq!(
            serde_json::to_value(ReadinessState::Failed("boom".to_string())).unwrap(),
            json!({ "status": "error", "error": "boom" })
        );
    }
}
