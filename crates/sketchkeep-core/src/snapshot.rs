//! Document snapshots.
//!
//! The editor's document schema is not ours to interpret: a snapshot is any
//! JSON value the editor hands out, and the same text encoding is used for
//! the autosave slot, the exported file and the imported file.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// The blank document loaded by the reset action.
const TEMPLATE_JSON: &str = include_str!("template.json");

/// Snapshot encoding errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("{0}")]
    Parse(#[source] serde_json::Error),
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// The full serializable state of one document at an instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Value);

impl Snapshot {
    /// Wrap a raw JSON value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The state of a document store that has never been loaded: no records
    /// and the default schema description.
    pub fn empty() -> Self {
        Self(json!({
            "store": {},
            "schema": default_schema(),
        }))
    }

    /// The bundled blank document.
    pub fn template() -> Result<Self, SnapshotError> {
        Self::from_json(TEMPLATE_JSON)
    }

    /// Borrow the underlying JSON value.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Take the underlying JSON value.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// The record map, when the snapshot has the `{store, schema}` layout.
    pub fn records(&self) -> Option<&Map<String, Value>> {
        self.0.get("store").and_then(Value::as_object)
    }

    /// Serialize to JSON text.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(&self.0).map_err(SnapshotError::Serialize)
    }

    /// Parse JSON text.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map(Self).map_err(SnapshotError::Parse)
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for Snapshot {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

fn default_schema() -> Value {
    json!({
        "schemaVersion": 2,
        "sequences": {},
    })
}
