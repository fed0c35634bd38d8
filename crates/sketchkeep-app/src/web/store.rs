//! Document store backed by the JavaScript editor.

use serde::Serialize;
use serde_json::Value;
use sketchkeep_core::{DocumentStore, Snapshot, StoreError, Subscription};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// Adapts the editor's JS store object, which must expose
/// `getSnapshot()`, `loadSnapshot(snapshot)` and `listen(fn) -> unlisten`.
pub struct JsDocumentStore {
    inner: JsValue,
}

impl JsDocumentStore {
    pub fn new(inner: JsValue) -> Result<Self, JsValue> {
        let store = Self { inner };
        for name in ["getSnapshot", "loadSnapshot", "listen"] {
            store
                .method(name)
                .map_err(|e| JsValue::from_str(&e.to_string()))?;
        }
        Ok(store)
    }

    fn method(&self, name: &str) -> Result<js_sys::Function, StoreError> {
        js_sys::Reflect::get(&self.inner, &JsValue::from_str(name))
            .ok()
            .and_then(|f| f.dyn_into::<js_sys::Function>().ok())
            .ok_or_else(|| StoreError::Host(format!("store has no {}() method", name)))
    }
}

impl DocumentStore for JsDocumentStore {
    fn get_snapshot(&self) -> Result<Snapshot, StoreError> {
        let raw = self
            .method("getSnapshot")?
            .call0(&self.inner)
            .map_err(|e| StoreError::Host(format!("getSnapshot threw: {:?}", e)))?;
        let value: Value = serde_wasm_bindgen::from_value(raw)
            .map_err(|e| StoreError::Host(format!("getSnapshot returned non-JSON data: {}", e)))?;
        Ok(Snapshot::new(value))
    }

    fn load_snapshot(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        let serializer = serde_wasm_bindgen::Serializer::json_compatible();
        let raw = snapshot
            .value()
            .serialize(&serializer)
            .map_err(|e| StoreError::Host(format!("Failed to convert snapshot: {}", e)))?;
        // The editor throws on snapshots it cannot migrate or validate.
        self.method("loadSnapshot")?
            .call1(&self.inner, &raw)
            .map_err(|e| StoreError::Schema(js_error_message(&e)))?;
        Ok(())
    }

    fn subscribe(&self, listener: Box<dyn Fn()>) -> Subscription {
        let callback = Closure::<dyn Fn(JsValue)>::new(move |_entry: JsValue| listener());

        let unlisten = self
            .method("listen")
            .and_then(|listen| {
                listen
                    .call1(&self.inner, callback.as_ref().unchecked_ref())
                    .map_err(|e| StoreError::Host(format!("listen threw: {:?}", e)))
            })
            .map(|f| f.dyn_into::<js_sys::Function>().ok());

        let unlisten = match unlisten {
            Ok(unlisten) => unlisten,
            Err(e) => {
                log::error!("Failed to subscribe to document changes: {}", e);
                None
            }
        };

        Subscription::new(move || {
            if let Some(unlisten) = unlisten {
                if let Err(e) = unlisten.call0(&JsValue::NULL) {
                    log::warn!("unlisten threw: {:?}", e);
                }
            }
            // The JS side no longer references the callback.
            drop(callback);
        })
    }
}

fn js_error_message(error: &JsValue) -> String {
    error
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| error.as_string())
        .unwrap_or_else(|| format!("{:?}", error))
}
