//! Narrow capability interface over a PDF library.
//!
//! The pipeline only needs four things from a PDF engine: open a document,
//! count its pages, extract a page's text and enumerate a page's images.
//! [`PdfBackend`] and [`PdfSource`] expose exactly that, so the walker can be
//! driven by pdfium in production and by synthetic documents in tests.
//!
//! All methods are blocking; the pipeline calls them from
//! `tokio::task::spawn_blocking`.

pub mod pdfium;

use crate::output::DocumentMetadata;
use thiserror::Error;

pub use self::pdfium::PdfiumBackend;

/// Failure reported by a backend.
///
/// `Malformed` is local to one page or image and the walker carries on;
/// `Corrupt` means the underlying stream is unusable and the document is
/// aborted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("password required")]
    PasswordRequired,

    #[error("wrong password")]
    WrongPassword,

    #[error("{0}")]
    Malformed(String),

    #[error("{0}")]
    Corrupt(String),
}

/// An image as decoded by the backend, already encoded for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub extension: String,
}

/// Opens PDF documents.
pub trait PdfBackend: Send + Sync {
    fn open<'a>(
        &'a self,
        bytes: &'a [u8],
        password: Option<&str>,
    ) -> Result<Box<dyn PdfSource + 'a>, BackendError>;
}

/// An open document. Page indices are 0-based.
pub trait PdfSource {
    fn page_count(&self) -> usize;

    fn metadata(&self) -> DocumentMetadata;

    fn page_text(&self, index: usize) -> Result<String, BackendError>;

    /// Images on the page in content-stream order. The outer error covers
    /// enumeration; each inner error covers decoding one image.
    fn page_images(&self, index: usize) -> Result<Vec<Result<RawImage, BackendError>>, BackendError>;

    /// Number of images on the page, without decoding them.
    fn page_image_count(&self, index: usize) -> Result<usize, BackendError> {
        self.page_images(index).map(|images| images.len())
    }
}
