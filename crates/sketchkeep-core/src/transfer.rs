//! User-triggered document transfer: reset to the bundled template, import
//! from a file, export to a file.
//!
//! The file dialog and download mechanics are platform concerns and sit
//! behind [`FilePicker`] and [`FileSink`].

use crate::BoxFuture;
use crate::document::{DocumentStore, StoreError};
use crate::snapshot::{Snapshot, SnapshotError};
use std::rc::Rc;
use thiserror::Error;

/// Name of the exported file.
pub const EXPORT_FILE_NAME: &str = "result.json";

/// MIME type of the exported file.
pub const EXPORT_MIME_TYPE: &str = "application/json";

/// Transfer errors. None of them touch the current document.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Failed to read file: {0}")]
    Read(String),
    #[error("Unsupported file type: {0}")]
    Unsupported(String),
    #[error("Invalid document file: {0}")]
    Parse(#[source] SnapshotError),
    #[error("Failed to encode document: {0}")]
    Encode(#[source] SnapshotError),
    #[error("Document rejected: {0}")]
    Rejected(#[source] StoreError),
    #[error("Failed to read document: {0}")]
    Store(#[source] StoreError),
    #[error("Failed to write file: {0}")]
    Write(String),
    #[error("File dialog error: {0}")]
    Dialog(String),
}

/// Result type for transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// Restricts what the user may pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    /// Human-readable name of the file type.
    pub description: String,
    /// Accepted extensions, without the leading dot.
    pub extensions: Vec<String>,
}

impl FileFilter {
    /// JSON documents.
    pub fn json() -> Self {
        Self {
            description: "JSON Document".to_string(),
            extensions: vec!["json".to_string()],
        }
    }

    /// The filter as an HTML `accept` attribute, e.g. `.json`.
    pub fn accept_attribute(&self) -> String {
        self.extensions
            .iter()
            .map(|ext| format!(".{}", ext))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Whether a file name carries one of the accepted extensions.
    pub fn matches(&self, file_name: &str) -> bool {
        let Some((_, ext)) = file_name.rsplit_once('.') else {
            return false;
        };
        self.extensions.iter().any(|accepted| accepted.eq_ignore_ascii_case(ext))
    }
}

/// Text of a picked file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub name: String,
    pub text: String,
}

/// Outcome of one file dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePick {
    Selected(FileContent),
    /// The user dismissed the dialog.
    Cancelled,
}

/// A single-shot, single-selection file dialog.
///
/// Each call opens an independent dialog which is torn down after exactly
/// one selection or cancellation.
pub trait FilePicker {
    fn pick_file(&self, filter: &FileFilter) -> BoxFuture<'_, TransferResult<FilePick>>;
}

/// A file ready to be handed to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArtifact {
    pub file_name: String,
    pub mime_type: String,
    pub contents: String,
}

/// What became of a delivered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Written, or handed to the browser's download manager.
    Delivered,
    /// The user dismissed the save dialog.
    Dismissed,
}

/// Delivers an exported file: a browser download or a native save dialog.
pub trait FileSink {
    fn deliver(&self, artifact: &FileArtifact) -> TransferResult<Delivery>;
}

/// Result of an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The picked file replaced the document.
    Loaded { file_name: String },
    Cancelled,
}

/// Result of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Saved(FileArtifact),
    /// Nothing was written.
    Cancelled,
}

/// The reset, load and save menu commands.
pub struct TransferActions<D: DocumentStore> {
    store: Rc<D>,
    template: Snapshot,
}

impl<D: DocumentStore> TransferActions<D> {
    /// Create actions that reset to `template`.
    pub fn new(store: Rc<D>, template: Snapshot) -> Self {
        Self { store, template }
    }

    /// Create actions that reset to the bundled blank document.
    pub fn with_bundled_template(store: Rc<D>) -> Result<Self, SnapshotError> {
        Ok(Self::new(store, Snapshot::template()?))
    }

    /// Replace the document with the template. Idempotent.
    pub fn reset(&self) -> TransferResult<()> {
        self.store
            .load_snapshot(self.template.clone())
            .map_err(TransferError::Rejected)?;
        log::info!("Document reset to template");
        Ok(())
    }

    /// Ask the user for a `.json` file and load it.
    ///
    /// Cancelling is not an error. Any failure leaves the document as it
    /// was. Concurrent imports are independent; whichever completes last
    /// determines the document.
    pub async fn import<P: FilePicker + ?Sized>(&self, picker: &P) -> TransferResult<ImportOutcome> {
        let filter = FileFilter::json();
        let file = match picker.pick_file(&filter).await? {
            FilePick::Selected(file) => file,
            FilePick::Cancelled => {
                log::debug!("Import cancelled");
                return Ok(ImportOutcome::Cancelled);
            }
        };
        // The dialog's filter is only a hint; "All files" can bypass it.
        if !filter.matches(&file.name) {
            return Err(TransferError::Unsupported(file.name));
        }

        self.load_text(&file.text)?;
        log::info!("Imported document from '{}'", file.name);
        Ok(ImportOutcome::Loaded { file_name: file.name })
    }

    /// Parse exported text and load it into the store.
    pub fn load_text(&self, text: &str) -> TransferResult<()> {
        let snapshot = Snapshot::from_json(text).map_err(TransferError::Parse)?;
        self.store
            .load_snapshot(snapshot)
            .map_err(TransferError::Rejected)
    }

    /// Serialize the current document as the export file.
    pub fn export_artifact(&self) -> TransferResult<FileArtifact> {
        let snapshot = self.store.get_snapshot().map_err(TransferError::Store)?;
        let contents = snapshot.to_json().map_err(TransferError::Encode)?;
        Ok(FileArtifact {
            file_name: EXPORT_FILE_NAME.to_string(),
            mime_type: EXPORT_MIME_TYPE.to_string(),
            contents,
        })
    }

    /// Serialize the current document and hand it to `sink`. Read-only.
    pub fn export<K: FileSink + ?Sized>(&self, sink: &K) -> TransferResult<ExportOutcome> {
        let artifact = self.export_artifact()?;
        match sink.deliver(&artifact)? {
            Delivery::Delivered => {
                log::info!("Exported {} ({} bytes)", artifact.file_name, artifact.contents.len());
                Ok(ExportOutcome::Saved(artifact))
            }
            Delivery::Dismissed => {
                log::debug!("Export cancelled");
                Ok(ExportOutcome::Cancelled)
            }
        }
    }

    pub fn template(&self) -> &Snapshot {
        &self.template
    }

    pub fn store(&self) -> &Rc<D> {
        &self.store
    }
}
