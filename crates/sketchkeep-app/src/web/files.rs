//! Browser file picker and download.

use sketchkeep_core::{
    BoxFuture, Delivery, FileArtifact, FileContent, FileFilter, FilePick, FilePicker, FileSink,
    TransferError, TransferResult,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

/// Opens a hidden, single-use `<input type="file">` per pick.
#[derive(Debug, Default)]
pub struct BrowserFilePicker;

impl FilePicker for BrowserFilePicker {
    fn pick_file(&self, filter: &FileFilter) -> BoxFuture<'_, TransferResult<FilePick>> {
        let accept = filter.accept_attribute();
        Box::pin(async move {
            let input = create_file_input(&accept)?;
            let picked = wait_for_selection(&input).await;
            // Torn down after exactly one selection or cancel.
            input.remove();
            picked?;

            let Some(file) = input.files().and_then(|files| files.get(0)) else {
                return Ok(FilePick::Cancelled);
            };
            let name = file.name();
            let text = read_text(&file).await?;
            log::info!("Read {} ({} bytes)", name, text.len());

            Ok(FilePick::Selected(FileContent { name, text }))
        })
    }
}

fn create_file_input(accept: &str) -> TransferResult<web_sys::HtmlInputElement> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| TransferError::Dialog("No document".to_string()))?;

    let input = document
        .create_element("input")
        .map_err(|e| TransferError::Dialog(format!("Failed to create input: {:?}", e)))?
        .dyn_into::<web_sys::HtmlInputElement>()
        .map_err(|_| TransferError::Dialog("Failed to cast to input".to_string()))?;

    input.set_type("file");
    input.set_accept(accept);
    input.set_multiple(false);
    input.style().set_property("display", "none").ok();

    let body = document
        .body()
        .ok_or_else(|| TransferError::Dialog("No body".to_string()))?;
    body.append_child(&input)
        .map_err(|e| TransferError::Dialog(format!("Failed to attach input: {:?}", e)))?;
    Ok(input)
}

/// Resolve on the first `change` or `cancel` event of the input.
async fn wait_for_selection(input: &web_sys::HtmlInputElement) -> TransferResult<()> {
    let mut attached = Ok(());
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        for event in ["change", "cancel"] {
            let resolve = resolve.clone();
            let callback = Closure::once_into_js(move || {
                let _ = resolve.call0(&JsValue::NULL);
            });
            if let Err(e) = input.add_event_listener_with_callback(event, callback.unchecked_ref()) {
                attached = Err(TransferError::Dialog(format!("Failed to listen for {}: {:?}", event, e)));
            }
        }
    });
    attached?;

    input.click();
    JsFuture::from(promise)
        .await
        .map(|_| ())
        .map_err(|e| TransferError::Dialog(format!("File dialog failed: {:?}", e)))
}

async fn read_text(file: &web_sys::File) -> TransferResult<String> {
    let reader = web_sys::FileReader::new()
        .map_err(|e| TransferError::Read(format!("Failed to create FileReader: {:?}", e)))?;

    let promise = js_sys::Promise::new(&mut |resolve, reject| {
        let loaded = reader.clone();
        let onload = Closure::once_into_js(move || {
            let result = loaded.result().unwrap_or(JsValue::NULL);
            let _ = resolve.call1(&JsValue::NULL, &result);
        });
        let onerror = Closure::once_into_js(move || {
            let _ = reject.call1(&JsValue::NULL, &JsValue::from_str("FileReader error"));
        });
        reader.set_onload(Some(onload.unchecked_ref()));
        reader.set_onerror(Some(onerror.unchecked_ref()));
    });

    reader
        .read_as_text_with_label(file, "utf-8")
        .map_err(|e| TransferError::Read(format!("{:?}", e)))?;

    JsFuture::from(promise)
        .await
        .map_err(|e| TransferError::Read(format!("{:?}", e)))?
        .as_string()
        .ok_or_else(|| TransferError::Read("file content is not text".to_string()))
}

/// Triggers a client-side download through a temporary object URL.
#[derive(Debug, Default)]
pub struct BrowserDownload;

impl FileSink for BrowserDownload {
    fn deliver(&self, artifact: &FileArtifact) -> TransferResult<Delivery> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| TransferError::Write("No document".to_string()))?;

        let blob_parts = js_sys::Array::new();
        blob_parts.push(&JsValue::from_str(&artifact.contents));

        let options = web_sys::BlobPropertyBag::new();
        options.set_type(&artifact.mime_type);

        let blob = web_sys::Blob::new_with_str_sequence_and_options(&blob_parts, &options)
            .map_err(|e| TransferError::Write(format!("Failed to create blob: {:?}", e)))?;

        let url = web_sys::Url::create_object_url_with_blob(&blob)
            .map_err(|e| TransferError::Write(format!("Failed to create URL: {:?}", e)))?;

        let anchor = document
            .create_element("a")
            .map_err(|e| TransferError::Write(format!("Failed to create element: {:?}", e)))?
            .dyn_into::<web_sys::HtmlAnchorElement>()
            .map_err(|_| TransferError::Write("Failed to cast to anchor".to_string()))?;

        anchor.set_href(&url);
        anchor.set_download(&artifact.file_name);
        anchor.click();

        web_sys::Url::revoke_object_url(&url).ok();
        Ok(Delivery::Delivered)
    }
}
