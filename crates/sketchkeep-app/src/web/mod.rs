//! WebAssembly entry point and JS bindings.
//!
//! The editor lives in JavaScript; it constructs a [`SketchKeep`] around its
//! store object and renders whatever `mount()` reports.

mod files;
mod store;

pub use files::{BrowserDownload, BrowserFilePicker};
pub use store::JsDocumentStore;

use crate::session::{CanvasSession, View};
use serde::Serialize;
use sketchkeep_core::storage::LocalStorage;
use sketchkeep_core::{
    ExportOutcome, ImportOutcome, MenuAction, MenuDescriptor, MenuLabels, PersistenceConfig,
    Subscription,
};
use std::cell::{Cell, RefCell};
use std::fmt::Display;
use std::rc::{Rc, Weak};
use std::time::Duration;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

type WebSession = CanvasSession<JsDocumentStore, LocalStorage>;

/// Initialize logging when the module loads.
#[wasm_bindgen(start)]
pub fn start() {
    // Set up panic hook for better error messages
    console_error_panic_hook::set_once();

    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&JsValue::from_str("SketchKeep: logger already initialized"));
    }
    log::info!("SketchKeep (WASM) loaded");
}

/// Persistence and file menu for one editor instance.
#[wasm_bindgen]
pub struct SketchKeep {
    session: Rc<WebSession>,
    ticks: Rc<TickScheduler>,
    on_change: RefCell<Option<Subscription>>,
}

#[wasm_bindgen]
impl SketchKeep {
    /// `store` is the editor's store object; `config` is an optional
    /// `{slot_key, debounce_ms, teardown}` object. `labels` is an optional
    /// language tag (`"en-US"`) or a `{submenu, reset, load, save}` object.
    #[wasm_bindgen(constructor)]
    pub fn new(store: JsValue, config: JsValue, labels: JsValue) -> Result<SketchKeep, JsValue> {
        let config: PersistenceConfig = if config.is_undefined() || config.is_null() {
            PersistenceConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(js_error)?
        };
        let labels = menu_labels(labels)?;

        let store = Rc::new(JsDocumentStore::new(store)?);
        let storage = Rc::new(LocalStorage::new().map_err(js_error)?);
        let session = CanvasSession::new(store, storage, config)
            .map_err(js_error)?
            .with_menu(MenuDescriptor::new(&labels));

        Ok(Self {
            session: Rc::new(session),
            ticks: Rc::new(TickScheduler::default()),
            on_change: RefCell::new(None),
        })
    }

    /// Restore the document and start autosaving. Returns the readiness
    /// state: `{status: "loading" | "ready" | "error", error?}`.
    pub fn mount(&self) -> Result<JsValue, JsValue> {
        self.on_change.borrow_mut().take();
        if self.session.mount() == View::Editor {
            let session = Rc::downgrade(&self.session);
            let ticks = Rc::downgrade(&self.ticks);
            let subscription = self.session.store().subscribe(Box::new(move || {
                if let (Some(ticks), Some(live)) = (ticks.upgrade(), session.upgrade()) {
                    ticks.arm(session.clone(), live.time_until_save());
                }
            }));
            *self.on_change.borrow_mut() = Some(subscription);
        }
        self.readiness()
    }

    /// Stop autosaving; a pending write is dropped unless the config asks
    /// for `teardown: "flush"`.
    pub fn unmount(&self) {
        self.on_change.borrow_mut().take();
        self.session.unmount();
    }

    pub fn readiness(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.readiness())
    }

    /// `{view: "loading" | "editor" | "error", message?}`.
    pub fn view(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.view())
    }

    /// The file submenu description for the editor's main menu.
    pub fn menu(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.menu())
    }

    pub fn reset(&self) -> Result<(), JsValue> {
        self.session.reset().map_err(js_error)
    }

    /// Download the document as `result.json`. Returns whether a download
    /// was started.
    pub fn save(&self) -> Result<bool, JsValue> {
        self.session
            .save(&BrowserDownload)
            .map(|outcome| matches!(outcome, ExportOutcome::Saved(_)))
            .map_err(js_error)
    }

    /// Pick a `.json` file and load it. Resolves to `"loaded"` or
    /// `"cancelled"`, rejects with the import error.
    pub fn load(&self) -> js_sys::Promise {
        let session = self.session.clone();
        wasm_bindgen_futures::future_to_promise(async move {
            match session.load(&BrowserFilePicker).await {
                Ok(ImportOutcome::Loaded { .. }) => Ok(JsValue::from_str("loaded")),
                Ok(ImportOutcome::Cancelled) => Ok(JsValue::from_str("cancelled")),
                Err(e) => Err(js_error(e)),
            }
        })
    }

    /// Run a menu item by id.
    pub fn dispatch(&self, id: &str) -> js_sys::Promise {
        let Some(action) = MenuAction::from_id(id) else {
            return js_sys::Promise::reject(&js_error(format!("Unknown menu item: {}", id)));
        };
        let session = self.session.clone();
        wasm_bindgen_futures::future_to_promise(async move {
            session
                .dispatch(action, &BrowserFilePicker, &BrowserDownload)
                .await
                .map(|()| JsValue::UNDEFINED)
                .map_err(js_error)
        })
    }

    /// The latest menu error, for a transient notification.
    pub fn take_notice(&self) -> Option<String> {
        self.session.take_notice()
    }
}

/// Keeps at most one `setTimeout` outstanding for the autosave deadline.
#[derive(Default)]
struct TickScheduler {
    armed: Cell<bool>,
}

impl TickScheduler {
    fn arm(self: &Rc<Self>, session: Weak<WebSession>, delay: Option<Duration>) {
        if self.armed.get() {
            return;
        }
        let Some(delay) = delay else {
            return;
        };

        let ticks = Rc::downgrade(self);
        let callback = Closure::once_into_js(move || {
            let (Some(ticks), Some(live)) = (ticks.upgrade(), session.upgrade()) else {
                return;
            };
            ticks.armed.set(false);
            if !live.tick() {
                // Pushed back by later edits.
                ticks.arm(session, live.time_until_save());
            }
        });

        let Some(window) = web_sys::window() else {
            log::error!("No window, autosave timer not armed");
            return;
        };
        // Round up so the callback never runs before the deadline.
        let millis = delay.as_millis().saturating_add(1).min(i32::MAX as u128) as i32;
        match window.set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), millis) {
            Ok(_) => self.armed.set(true),
            Err(e) => log::error!("Failed to arm autosave timer: {:?}", e),
        }
    }
}

fn menu_labels(labels: JsValue) -> Result<MenuLabels, JsValue> {
    if labels.is_undefined() || labels.is_null() {
        return Ok(MenuLabels::default());
    }
    match labels.as_string() {
        Some(locale) => Ok(MenuLabels::for_locale(&locale)),
        None => serde_wasm_bindgen::from_value(labels).map_err(js_error),
    }
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(js_error)
}

fn js_error(e: impl Display) -> JsValue {
    js_sys::Error::new(&e.to_string()).into()
}
