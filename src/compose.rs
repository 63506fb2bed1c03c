//! Output composition: one [`BatchResult`] → the messages handed to the host.
//!
//! Order is fixed: a text message, a JSON message, a blob carrying the same
//! text with an explicit MIME type, then one file message per file output.
//! An empty batch yields only a text message asking for files.
//!
//! ## JSON shape
//!
//! Keys are file names in batch order. A repeated name gets a ` (2)`,
//! ` (3)`, … suffix so no document is dropped.
//!
//! * text mode: `{"a.pdf": [{"text", "metadata": {"page", "file_name"}}, …]}`
//! * markdown mode: `{"a.pdf": {"file_name", "namespace", "status",
//!   "markdown", "paginated", "pages", "images", "image_errors",
//!   "page_errors", "metadata", "artifacts"}}`
//! * a failed document, either mode: `{"file_name", "namespace", "status":
//!   "failed", "error", "pages": []}`
//!
//! `status` is `completed`, `degraded` (some pages or images lost) or
//! `failed`.

use crate::config::ExtractionMode;
use crate::error::ExtractError;
use crate::output::{BatchResult, DocumentFailure, DocumentOutcome, DocumentResult, FileOutput};
use crate::pipeline::namer;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// Sent instead of any output when the batch is empty.
pub const NO_FILES_MESSAGE: &str = "No files provided. Please upload PDF files for processing.";

/// Descriptive fields of a blob message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMeta {
    pub mime_type: String,
    pub file_name: String,
}

/// One message of the host response.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolMessage {
    Text(String),
    Json(Value),
    Blob { bytes: Vec<u8>, meta: BlobMeta },
    File(FileOutput),
}

/// Build the host messages for a finished batch.
pub fn compose(batch: &BatchResult) -> Result<Vec<ToolMessage>, ExtractError> {
    if batch.outcomes.is_empty() {
        return Ok(vec![ToolMessage::Text(NO_FILES_MESSAGE.to_string())]);
    }

    let text = batch.combined_text();
    let mut messages = vec![
        ToolMessage::Text(text.clone()),
        ToolMessage::Json(batch_json(batch)?),
        ToolMessage::Blob {
            bytes: text.into_bytes(),
            meta: BlobMeta {
                mime_type: batch.mode.mime_type().to_string(),
                file_name: blob_file_name(batch),
            },
        },
    ];
    messages.extend(batch.files.iter().cloned().map(ToolMessage::File));
    Ok(messages)
}

/// The JSON message body.
pub fn batch_json(batch: &BatchResult) -> Result<Value, ExtractError> {
    let mut taken: HashSet<String> = batch
        .outcomes
        .iter()
        .map(|o| o.file_name().to_string())
        .collect();
    let mut seen = HashSet::new();
    let mut map = Map::new();

    for outcome in &batch.outcomes {
        let name = outcome.file_name();
        let key = if seen.insert(name) {
            name.to_string()
        } else {
            unique_key(&mut taken, name)
        };
        let value = match outcome {
            DocumentOutcome::Completed(doc) => match batch.mode {
                ExtractionMode::Text => to_value(&doc.pages)?,
                ExtractionMode::Markdown(_) => markdown_entry(doc)?,
            },
            DocumentOutcome::Failed(failure) => failed_entry(failure)?,
        };
        map.insert(key, value);
    }
    Ok(Value::Object(map))
}

fn markdown_entry(doc: &DocumentResult) -> Result<Value, ExtractError> {
    let status = if doc.is_degraded() { "degraded" } else { "completed" };
    let page_errors: Vec<_> = doc.page_errors().collect();
    Ok(json!({
        "file_name": doc.file_name,
        "namespace": doc.namespace,
        "status": status,
        "markdown": doc.content,
        "paginated": doc.paginated,
        "pages": to_value(&doc.pages)?,
        "images": to_value(&doc.images)?,
        "image_errors": to_value(&doc.image_errors)?,
        "page_errors": to_value(&page_errors)?,
        "metadata": to_value(&doc.metadata)?,
        "artifacts": to_value(&doc.artifacts)?,
    }))
}

fn failed_entry(failure: &DocumentFailure) -> Result<Value, ExtractError> {
    let kind = to_value(&failure.error)?
        .get("kind")
        .cloned()
        .unwrap_or(Value::Null);
    Ok(json!({
        "file_name": failure.file_name,
        "namespace": failure.namespace,
        "status": "failed",
        "error": failure.error.to_string(),
        "error_kind": kind,
        "pages": [],
    }))
}

fn to_value<T: serde::Serialize + ?Sized>(value: &T) -> Result<Value, ExtractError> {
    serde_json::to_value(value).map_err(|e| ExtractError::Internal(format!("JSON encoding: {e}")))
}

/// First free `name (2)`, `name (3)`, … for a repeated name. `taken` holds
/// every real file name of the batch, so a suffix never shadows an upload.
fn unique_key(taken: &mut HashSet<String>, name: &str) -> String {
    let mut n = 2usize;
    loop {
        let key = format!("{name} ({n})");
        if taken.insert(key.clone()) {
            return key;
        }
        n += 1;
    }
}

/// `{stem}.{ext}` for a single document, `documents.{ext}` otherwise.
fn blob_file_name(batch: &BatchResult) -> String {
    let ext = batch.mode.extension();
    match batch.outcomes.as_slice() {
        [only] => format!("{}.{}", namer::sanitize_stem(only.file_name()), ext),
        _ => format!("documents.{ext}"),
    }
}
