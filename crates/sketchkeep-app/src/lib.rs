//! SketchKeep Application
//!
//! The application shell: wires the persistence controller and the transfer
//! actions to one document store, and provides the platform file dialogs,
//! downloads and JS bindings.

mod session;

pub use session::{CanvasSession, View};

#[cfg(all(feature = "native", not(target_arch = "wasm32")))]
mod native;

#[cfg(all(feature = "native", not(target_arch = "wasm32")))]
pub use native::{DialogFilePicker, DialogFileSink};

#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(target_arch = "wasm32")]
pub use web::{BrowserDownload, BrowserFilePicker, JsDocumentStore, SketchKeep};
