//! One mounted editor: the persistence lifecycle plus the file menu.

use serde::Serialize;
use sketchkeep_core::storage::Storage;
use sketchkeep_core::{
    Clock, DocumentStore, ExportOutcome, FilePicker, FileSink, ImportOutcome, MenuAction,
    MenuDescriptor, PersistenceConfig, PersistenceController, ReadinessState, SnapshotError,
    SystemClock, TransferActions, TransferResult,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// What the host should render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", content = "message", rename_all = "snake_case")]
pub enum View {
    /// Startup is still reading the autosave slot.
    Loading,
    /// The live editor with the file menu.
    Editor,
    /// Full-screen, terminal error.
    Error(String),
}

impl From<&ReadinessState> for View {
    fn from(state: &ReadinessState) -> Self {
        match state {
            ReadinessState::Loading => View::Loading,
            ReadinessState::Ready => View::Editor,
            ReadinessState::Failed(message) => View::Error(message.clone()),
        }
    }
}

/// Persistence and transfer bound to one document store.
///
/// All methods take `&self` so the session can be shared with event
/// callbacks through an `Rc`. Store listeners may call back into the
/// session while `mount` is restoring the document; during that window the
/// session reads as `Loading` with nothing pending.
pub struct CanvasSession<D: DocumentStore, S: Storage, C: Clock = SystemClock> {
    persistence: RefCell<PersistenceController<D, S, C>>,
    transfer: TransferActions<D>,
    menu: MenuDescriptor,
    notice: RefCell<Option<String>>,
}

impl<D: DocumentStore, S: Storage> CanvasSession<D, S, SystemClock> {
    pub fn new(store: Rc<D>, storage: Rc<S>, config: PersistenceConfig) -> Result<Self, SnapshotError> {
        Self::with_clock(store, storage, config, SystemClock)
    }
}

impl<D: DocumentStore, S: Storage, C: Clock + 'static> CanvasSession<D, S, C> {
    pub fn with_clock(
        store: Rc<D>,
        storage: Rc<S>,
        config: PersistenceConfig,
        clock: C,
    ) -> Result<Self, SnapshotError> {
        let transfer = TransferActions::with_bundled_template(store.clone())?;
        Ok(Self {
            persistence: RefCell::new(PersistenceController::with_clock(store, storage, config, clock)),
            transfer,
            menu: MenuDescriptor::default(),
            notice: RefCell::new(None),
        })
    }

    /// Replace the file menu labels.
    pub fn with_menu(mut self, menu: MenuDescriptor) -> Self {
        self.menu = menu;
        self
    }

    /// Restore the document and, once ready, start autosaving. Mounting
    /// again re-runs the restore.
    pub fn mount(&self) -> View {
        let view = View::from(self.persistence.borrow_mut().initialize());
        if view == View::Editor {
            if let Err(e) = self.persistence.borrow_mut().start_auto_save() {
                log::error!("Failed to start autosave: {}", e);
            }
        }
        view
    }

    /// Stop autosaving. A pending write follows the configured teardown policy.
    pub fn unmount(&self) {
        self.persistence.borrow_mut().stop();
    }

    pub fn view(&self) -> View {
        View::from(&self.readiness())
    }

    pub fn readiness(&self) -> ReadinessState {
        self.persistence
            .try_borrow()
            .map_or(ReadinessState::Loading, |persistence| persistence.state().clone())
    }

    /// One event-loop turn: write the autosave slot if its window elapsed.
    ///
    /// Write failures are logged by the controller and otherwise ignored;
    /// losing persistence must not end the editing session.
    pub fn tick(&self) -> bool {
        let Ok(mut persistence) = self.persistence.try_borrow_mut() else {
            return false;
        };
        persistence.maybe_save().unwrap_or(false)
    }

    /// Time until the pending autosave is due.
    pub fn time_until_save(&self) -> Option<Duration> {
        self.persistence
            .try_borrow()
            .ok()
            .and_then(|persistence| persistence.time_until_save())
    }

    pub fn is_save_pending(&self) -> bool {
        self.persistence
            .try_borrow()
            .is_ok_and(|persistence| persistence.is_save_pending())
    }

    /// The shared document store.
    pub fn store(&self) -> &Rc<D> {
        self.transfer.store()
    }

    pub fn menu(&self) -> &MenuDescriptor {
        &self.menu
    }

    /// "Clear": load the blank template.
    pub fn reset(&self) -> TransferResult<()> {
        self.report(self.transfer.reset())
    }

    /// "Open": import a document file.
    pub async fn load<P: FilePicker + ?Sized>(&self, picker: &P) -> TransferResult<ImportOutcome> {
        let result = self.transfer.import(picker).await;
        self.report(result)
    }

    /// "Save": export the document as `result.json`.
    pub fn save<K: FileSink + ?Sized>(&self, sink: &K) -> TransferResult<ExportOutcome> {
        self.report(self.transfer.export(sink))
    }

    /// Run a menu command.
    pub async fn dispatch<P, K>(&self, action: MenuAction, picker: &P, sink: &K) -> TransferResult<()>
    where
        P: FilePicker + ?Sized,
        K: FileSink + ?Sized,
    {
        match action {
            MenuAction::Reset => self.reset(),
            MenuAction::Load => self.load(picker).await.map(|_| ()),
            MenuAction::Save => self.save(sink).map(|_| ()),
        }
    }

    /// Take the latest user-facing error from a menu command.
    pub fn take_notice(&self) -> Option<String> {
        self.notice.borrow_mut().take()
    }

    fn report<T>(&self, result: TransferResult<T>) -> TransferResult<T> {
        if let Err(e) = &result {
            log::error!("{}", e);
            *self.notice.borrow_mut() = Some(e.to_string());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sketchkeep_core::storage::MemoryStorage;
    use sketchkeep_core::{
        BoxFuture, Delivery, FileArtifact, FileContent, FileFilter, FilePick, ManualClock,
        MemoryDocumentStore, MenuLabels, Snapshot, DEFAULT_SLOT_KEY,
    };
    use std::cell::Cell;

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        use std::task::{Context, Poll, Waker};

        let mut cx = Context::from_waker(Waker::noop());
        let mut f = std::pin::pin!(f);

        loop {
            if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
                return result;
            }
        }
    }

    struct TextPicker(Option<String>);

    impl FilePicker for TextPicker {
        fn pick_file(&self, _filter: &FileFilter) -> BoxFuture<'_, TransferResult<FilePick>> {
            let pick = match &self.0 {
                Some(text) => FilePick::Selected(FileContent {
                    name: "result.json".to_string(),
                    text: text.clone(),
                }),
                None => FilePick::Cancelled,
            };
            Box::pin(async move { Ok(pick) })
        }
    }

    #[derive(Default)]
    struct CountingSink(Cell<usize>);

    impl FileSink for CountingSink {
        fn deliver(&self, _artifact: &FileArtifact) -> TransferResult<Delivery> {
            self.0.set(self.0.get() + 1);
            Ok(Delivery::Delivered)
        }
    }

    type Session = CanvasSession<MemoryDocumentStore, MemoryStorage, ManualClock>;

    fn session(storage: MemoryStorage) -> (Session, Rc<MemoryDocumentStore>, ManualClock) {
        let store = Rc::new(MemoryDocumentStore::new());
        let clock = ManualClock::new();
        let session = CanvasSession::with_clock(
            store.clone(),
            Rc::new(storage),
            PersistenceConfig::default(),
            clock.clone(),
        )
        .unwrap();
        (session, store, clock)
    }

    const WINDOW: Duration = Duration::from_millis(500);

    #[test]
    fn test_mount_fresh_shows_editor() {
        let (session, _, _) = session(MemoryStorage::new());
        assert_eq!(session.view(), View::Loading);

        assert_eq!(session.mount(), View::Editor);
        assert_eq!(session.readiness(), ReadinessState::Ready);
    }

    #[test]
    fn test_mount_corrupt_slot_shows_error() {
        let (session, store, clock) = session(MemoryStorage::with_entry(DEFAULT_SLOT_KEY, "{not json"));

        let View::Error(message) = session.mount() else {
            panic!("expected error view");
        };
        assert!(!message.is_empty());

        store.put_record("shape:a", json!({}));
        clock.advance(WINDOW);
        assert!(!session.tick());
    }

    #[test]
    fn test_edits_autosave_after_window() {
        let (session, store, clock) = session(MemoryStorage::new());
        session.mount();

        store.put_record("shape:a", json!({ "x": 1 }));
        store.put_record("shape:a", json!({ "x": 2 }));
        assert!(!session.tick());
        assert_eq!(session.time_until_save(), Some(WINDOW));

        clock.advance(WINDOW);
        assert!(session.tick());
        assert!(!session.is_save_pending());
    }

    #[test]
    fn test_reset_is_persisted_like_any_edit() {
        let (session, store, clock) = session(MemoryStorage::new());
        session.mount();

        session.reset().unwrap();
        clock.advance(WINDOW);
        assert!(session.tick());
        assert_eq!(store.get_snapshot().unwrap(), Snapshot::template().unwrap());
    }

    #[test]
    fn test_failed_import_sets_notice_and_keeps_document() {
        let (session, store, _) = session(MemoryStorage::new());
        session.mount();
        store.put_record("shape:keep", json!({}));
        let before = store.get_snapshot().unwrap();

        let result = block_on(session.load(&TextPicker(Some("{not json".to_string()))));

        assert!(result.is_err());
        assert_eq!(store.get_snapshot().unwrap(), before);
        let notice = session.take_notice().expect("notice for failed import");
        assert!(notice.starts_with("Invalid document file"));
        assert_eq!(session.take_notice(), None);
    }

    #[test]
    fn test_dispatch_routes_menu_actions() {
        let (session, store, _) = session(MemoryStorage::new());
        session.mount();
        let sink = CountingSink::default();
        let exported = Snapshot::template().unwrap().to_json().unwrap();
        let picker = TextPicker(Some(exported));

        block_on(session.dispatch(MenuAction::Save, &picker, &sink)).unwrap();
        assert_eq!(sink.0.get(), 1);

        block_on(session.dispatch(MenuAction::Load, &picker, &sink)).unwrap();
        assert_eq!(store.len(), 2);

        store.put_record("shape:a", json!({}));
        block_on(session.dispatch(MenuAction::Reset, &picker, &sink)).unwrap();
        assert_eq!(store.get_snapshot().unwrap(), Snapshot::template().unwrap());
    }

    #[test]
    fn test_cancelled_load_is_silent() {
        let (session, _, _) = session(MemoryStorage::new());
        session.mount();

        let outcome = block_on(session.load(&TextPicker(None))).unwrap();
        assert_eq!(outcome, ImportOutcome::Cancelled);
        assert_eq!(session.take_notice(), None);
    }

    #[test]
    fn test_unmount_discards_pending_save() {
        let (session, store, clock) = session(MemoryStorage::new());
        session.mount();

        store.put_record("shape:a", json!({}));
        session.unmount();
        clock.advance(WINDOW);

        assert!(!session.tick());
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_remount_with_listener_reading_session() {
        let saved = Snapshot::template().unwrap().to_json().unwrap();
        let (session, store, clock) = session(MemoryStorage::with_entry(DEFAULT_SLOT_KEY, &saved));
        let session = Rc::new(session);
        assert_eq!(session.mount(), View::Editor);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let weak = Rc::downgrade(&session);
        let record = seen.clone();
        let _subscription = store.subscribe(Box::new(move || {
            if let Some(session) = weak.upgrade() {
                record.borrow_mut().push((session.view(), session.time_until_save(), session.tick()));
            }
        }));

        assert_eq!(session.mount(), View::Editor);
        assert_eq!(seen.borrow().as_slice(), &[(View::Loading, None, false)]);

        store.put_record("shape:a", json!({}));
        assert_eq!(seen.borrow().last(), Some(&(View::Editor, None, false)));
        assert_eq!(session.time_until_save(), Some(WINDOW));
        clock.advance(WINDOW);
        assert!(session.tick());
    }

    #[test]
    fn test_with_menu_replaces_labels() {
        let (session, _, _) = session(MemoryStorage::new());
        let session = session.with_menu(MenuDescriptor::new(&MenuLabels::english()));

        assert_eq!(session.menu().label, "File");
        assert_eq!(session.menu().items[0].label, "Clear");
    }

    #[test]
    fn test_view_json_shape() {
        assert_eq!(
            serde_json::to_value(View::Error("bad".to_string())).unwrap(),
            json!({ "view": "error", "message": "bad" })
        );
        assert_eq!(serde_json::to_value(View::Editor).unwrap(), json!({ "view": "editor" }));
    }
}
