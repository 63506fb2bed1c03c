//! Result types produced by the extraction pipeline.
//!
//! A batch yields one [`DocumentOutcome`] per input file, in input order.
//! Completed documents carry their [`PageRecord`]s and the
//! [`ImageReference`]s returned by the sink; failed ones carry only the
//! [`DocumentError`] that stopped them.

use crate::config::{ExtractionMode, FILE_BREAK};
use crate::error::{DocumentError, ImageError, PageError};
use crate::pipeline::namer::{self, FileNamespace};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Document-level metadata read from the PDF info dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Per-page metadata echoed into the JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    /// 1-indexed page number.
    pub page: usize,
    pub file_name: String,
}

/// One page's extracted content.
///
/// Serialises as `{"text": …, "metadata": {"page": N, "file_name": …}}`,
/// plus `images` / `error` when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Verbatim text (text mode) or Markdown with resolved image links.
    pub text: String,
    pub metadata: PageMetadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PageError>,
}

impl PageRecord {
    pub fn page_number(&self) -> usize {
        self.metadata.page
    }
}

/// One embedded image pulled from a page, ready to hand to a sink.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    pub namespace: FileNamespace,
    /// 1-indexed page number.
    pub page_number: usize,
    /// 0-indexed position among the images enumerated on the page.
    pub sequence_in_page: usize,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub extension: String,
}

impl ExtractedImage {
    /// `{namespace}/page_{n}_{seq}.{ext}`, unique within the batch.
    pub fn entry_name(&self) -> String {
        namer::image_entry_name(
            &self.namespace,
            self.page_number,
            self.sequence_in_page,
            &self.extension,
        )
    }
}

/// Where a sink put an artefact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "storage", rename_all = "snake_case")]
pub enum ImageReference {
    Local {
        path: PathBuf,
    },
    Zip {
        entry: String,
    },
    ObjectStorage {
        bucket: String,
        key: String,
        url: String,
        expires_in_secs: u64,
    },
}

impl ImageReference {
    /// The string a Markdown link should point at.
    pub fn address(&self) -> String {
        match self {
            ImageReference::Local { path } => path.to_string_lossy().replace('\\', "/"),
            ImageReference::Zip { entry } => entry.clone(),
            ImageReference::ObjectStorage { url, .. } => url.clone(),
        }
    }
}

/// A persisted image as reported in the JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub page: usize,
    /// 0-indexed position on the page.
    pub index: usize,
    pub mime_type: String,
    #[serde(flatten)]
    pub reference: ImageReference,
}

/// Everything extracted from one successfully opened document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResult {
    pub file_name: String,
    pub namespace: String,
    /// Pages in document order; page numbers run 1..=N without gaps.
    pub pages: Vec<PageRecord>,
    /// Page texts joined with [`crate::config::PAGE_BREAK`].
    ///
    /// Markdown pages escape the marker, so splitting on it gives back the
    /// pages exactly. Text pages are verbatim: a page whose own text holds
    /// the marker splits into more parts than there are pages, and
    /// [`DocumentResult::pages`] is the authoritative per-page view.
    pub content: String,
    pub paginated: bool,
    pub images: Vec<ImageRecord>,
    pub image_errors: Vec<ImageError>,
    /// Markdown files written next to the images (local / zip storage).
    pub artifacts: Vec<ImageReference>,
    pub metadata: DocumentMetadata,
}

impl DocumentResult {
    pub fn page_errors(&self) -> impl Iterator<Item = &PageError> {
        self.pages.iter().filter_map(|p| p.error.as_ref())
    }

    /// True when the document succeeded but lost pages or images.
    pub fn is_degraded(&self) -> bool {
        !self.image_errors.is_empty() || self.page_errors().next().is_some()
    }
}

/// A document that produced no result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentFailure {
    pub file_name: String,
    pub namespace: String,
    pub error: DocumentError,
}

/// The fate of one input file.
#[derive(Debug, Clone)]
pub enum DocumentOutcome {
    Completed(DocumentResult),
    Failed(DocumentFailure),
}

impl DocumentOutcome {
    pub fn file_name(&self) -> &str {
        match self {
            DocumentOutcome::Completed(d) => &d.file_name,
            DocumentOutcome::Failed(f) => &f.file_name,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            DocumentOutcome::Completed(d) => &d.namespace,
            DocumentOutcome::Failed(f) => &f.namespace,
        }
    }

    pub fn as_completed(&self) -> Option<&DocumentResult> {
        match self {
            DocumentOutcome::Completed(d) => Some(d),
            DocumentOutcome::Failed(_) => None,
        }
    }

    pub fn as_failed(&self) -> Option<&DocumentFailure> {
        match self {
            DocumentOutcome::Completed(_) => None,
            DocumentOutcome::Failed(f) => Some(f),
        }
    }
}

/// Bytes of a file output, in memory or on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileData {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// A downloadable artefact handed back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutput {
    /// Name relative to the artefact root, e.g. `report-1a2b3c4d5e6f/page_2_0.png`.
    pub file_name: String,
    pub mime_type: String,
    pub data: FileData,
}

impl FileOutput {
    /// Load the bytes, reading from disk for path-backed outputs.
    pub fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        match &self.data {
            FileData::Bytes(b) => Ok(b.clone()),
            FileData::Path(p) => std::fs::read(p),
        }
    }
}

/// Summary counters for a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_documents: usize,
    pub processed_documents: usize,
    pub failed_documents: usize,
    pub total_pages: usize,
    pub failed_pages: usize,
    pub images_persisted: usize,
    pub images_failed: usize,
    pub duration_ms: u64,
}

/// Output of one invocation.
///
/// When images were written to a temporary local directory, that directory
/// lives as long as this value (and any clone of its workspace handle).
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub mode: ExtractionMode,
    /// One entry per input file, in input order.
    pub outcomes: Vec<DocumentOutcome>,
    pub files: Vec<FileOutput>,
    pub stats: BatchStats,
    pub(crate) workspace: Option<Arc<TempDir>>,
}

impl BatchResult {
    pub fn documents(&self) -> impl Iterator<Item = &DocumentResult> {
        self.outcomes.iter().filter_map(DocumentOutcome::as_completed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &DocumentFailure> {
        self.outcomes.iter().filter_map(DocumentOutcome::as_failed)
    }

    /// Temporary directory backing local file outputs, if any.
    pub fn workspace_dir(&self) -> Option<&Path> {
        self.workspace.as_deref().map(TempDir::path)
    }

    /// Human-readable text for the whole batch.
    ///
    /// Documents are separated by [`FILE_BREAK`]; a failed document
    /// contributes an `Error processing …` line in its slot.
    pub fn combined_text(&self) -> String {
        self.outcomes
            .iter()
            .map(|o| match o {
                DocumentOutcome::Completed(d) => d.content.clone(),
                DocumentOutcome::Failed(f) => {
                    format!("Error processing {}: {}", f.file_name, f.error)
                }
            })
            .collect::<Vec<_>>()
            .join(FILE_BREAK)
    }
}
