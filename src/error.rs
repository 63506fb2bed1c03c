//! Error types for the edgequake-pdf-extract library.
//!
//! Failures are captured at the narrowest scope that can absorb them:
//!
//! * [`ExtractError`]: fatal, the invocation cannot produce any output
//!   (bad configuration, unreadable input path, the shared ZIP archive became
//!   unwritable). Returned as `Err(ExtractError)` from the batch entry points.
//!
//! * [`DocumentError`]: one document could not be opened or was aborted.
//!   Recorded in a [`crate::output::DocumentFailure`]; the rest of the batch
//!   carries on.
//!
//! * [`PageError`]: one page could not be extracted. Recorded on its
//!   [`crate::output::PageRecord`]; the document carries on.
//!
//! * [`ImageError`]: one image could not be decoded or persisted. Recorded in
//!   [`crate::output::DocumentResult::image_errors`]; its Markdown placeholder
//!   becomes an "unavailable" marker.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf-extract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or parameter validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Object storage was selected but no client could be built.
    #[error("Object storage is not configured: {0}")]
    StorageNotConfigured(String),

    // ── Backend errors ────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/dir/containing/libpdfium or install pdfium\n\
into a system library path.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Batch errors ──────────────────────────────────────────────────────
    /// A resource shared by every document (the ZIP archive) is unusable.
    /// No partial output is produced.
    #[error("Batch aborted: {0}")]
    FatalBatch(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a whole document produced no [`crate::output::DocumentResult`].
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentError {
    /// The bytes do not start with the `%PDF` signature.
    #[error("file is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// The document is encrypted and no password was supplied.
    #[error("PDF is encrypted and requires a password")]
    PasswordRequired,

    /// A password was supplied but rejected.
    #[error("wrong password for encrypted PDF")]
    WrongPassword,

    /// Header, trailer or xref could not be parsed.
    #[error("PDF is corrupt: {detail}")]
    Corrupt { detail: String },

    /// Extraction started but hit an unrecoverable stream error.
    #[error("extraction aborted on page {page}: {detail}")]
    Aborted { page: usize, detail: String },

    /// The per-document deadline elapsed.
    #[error("processing timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The extraction task panicked or was cancelled.
    #[error("internal error: {detail}")]
    Internal { detail: String },
}

/// A non-fatal error for a single page.
///
/// The page still appears in the output with whatever content could be
/// salvaged (usually an empty string).
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageError {
    /// Text extraction failed for this page.
    #[error("Page {page}: text extraction failed: {detail}")]
    ExtractionFailed { page: usize, detail: String },

    /// Image enumeration failed; the page text is still present.
    #[error("Page {page}: images could not be enumerated: {detail}")]
    ImagesUnavailable { page: usize, detail: String },
}

/// A non-fatal error for a single embedded image.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageError {
    /// The backend found the image but could not decode or re-encode it.
    #[error("Page {page} image {index}: decode failed: {detail}")]
    DecodeFailed {
        page: usize,
        index: usize,
        detail: String,
    },

    /// The sink rejected the image (disk write, upload or presign failure).
    #[error("Page {page} image {index}: persist failed: {detail}")]
    PersistFailed {
        page: usize,
        index: usize,
        detail: String,
    },
}

/// Errors from an [`crate::sink::ObjectStorage`] client.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("{0}")]
    Other(String),
}
