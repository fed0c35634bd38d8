//! Native file dialogs.

use sketchkeep_core::{
    BoxFuture, Delivery, FileArtifact, FileContent, FileFilter, FilePick, FilePicker, FileSink,
    TransferError, TransferResult,
};

/// Open dialog backed by the platform's native file chooser.
#[derive(Debug, Default)]
pub struct DialogFilePicker;

impl FilePicker for DialogFilePicker {
    fn pick_file(&self, filter: &FileFilter) -> BoxFuture<'_, TransferResult<FilePick>> {
        let dialog = rfd::AsyncFileDialog::new()
            .set_title("Open Document")
            .add_filter(filter.description.as_str(), filter.extensions.as_slice());

        Box::pin(async move {
            let Some(handle) = dialog.pick_file().await else {
                return Ok(FilePick::Cancelled);
            };

            let name = handle.file_name();
            let bytes = handle.read().await;
            let text = String::from_utf8(bytes)
                .map_err(|e| TransferError::Read(format!("{} is not UTF-8: {}", name, e)))?;
            log::info!("Read {} ({} bytes)", name, text.len());

            Ok(FilePick::Selected(FileContent { name, text }))
        })
    }
}

/// Save dialog that writes the exported file where the user chooses.
#[derive(Debug, Default)]
pub struct DialogFileSink;

impl FileSink for DialogFileSink {
    fn deliver(&self, artifact: &FileArtifact) -> TransferResult<Delivery> {
        let dialog = rfd::FileDialog::new()
            .set_title("Save Document")
            .set_file_name(&artifact.file_name)
            .add_filter("JSON Document", &["json"]);

        let Some(path) = dialog.save_file() else {
            return Ok(Delivery::Dismissed);
        };

        std::fs::write(&path, &artifact.contents)
            .map_err(|e| TransferError::Write(format!("{}: {}", path.display(), e)))?;
        log::info!("Saved document to: {:?}", path);
        Ok(Delivery::Delivered)
    }
}
