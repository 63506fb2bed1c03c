//! pdfium-backed [`PdfBackend`].
//!
//! `pdfium-render` is compiled with its `thread_safe` and `sync` features:
//! every call into the C library is serialised behind a mutex and `Pdfium`
//! is `Send + Sync`. One [`PdfiumBackend`] is shared across the batch;
//! documents still overlap on I/O and on everything outside pdfium.

use super::{BackendError, PdfBackend, PdfSource, RawImage};
use crate::error::ExtractError;
use crate::output::DocumentMetadata;
use crate::pipeline::encode;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// A bound pdfium library.
pub struct PdfiumBackend {
    pdfium: Pdfium,
}

impl PdfiumBackend {
    /// Bind pdfium from `lib_dir` if given, else from the working directory,
    /// else from the system library path.
    pub fn bind(lib_dir: Option<&Path>) -> Result<Self, ExtractError> {
        let bindings = match lib_dir {
            Some(dir) => {
                let dir = dir.to_string_lossy().to_string();
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir.as_str()))
            }
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| ExtractError::PdfiumBindingFailed(format!("{e:?}")))?;

        info!("pdfium bound");
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl PdfBackend for PdfiumBackend {
    fn open<'a>(
        &'a self,
        bytes: &'a [u8],
        password: Option<&str>,
    ) -> Result<Box<dyn PdfSource + 'a>, BackendError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, password)
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                if err_str.contains("Password") || err_str.contains("password") {
                    if password.is_some() {
                        BackendError::WrongPassword
                    } else {
                        BackendError::PasswordRequired
                    }
                } else {
                    BackendError::Corrupt(err_str)
                }
            })?;

        info!("PDF loaded: {} pages", document.pages().len());
        Ok(Box::new(PdfiumSource { document }))
    }
}

struct PdfiumSource<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumSource<'a> {
    fn page(&self, index: usize) -> Result<PdfPage<'a>, BackendError> {
        self.document
            .pages()
            .get(index as u16)
            .map_err(|e| BackendError::Malformed(format!("{:?}", e)))
    }
}

impl PdfSource for PdfiumSource<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn metadata(&self) -> DocumentMetadata {
        let metadata = self.document.metadata();

        let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
            metadata.get(tag).and_then(|t| {
                let v = t.value().to_string();
                if v.is_empty() {
                    None
                } else {
                    Some(v)
                }
            })
        };

        DocumentMetadata {
            title: get_meta(PdfDocumentMetadataTagType::Title),
            author: get_meta(PdfDocumentMetadataTagType::Author),
            subject: get_meta(PdfDocumentMetadataTagType::Subject),
            creator: get_meta(PdfDocumentMetadataTagType::Creator),
            producer: get_meta(PdfDocumentMetadataTagType::Producer),
            creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
            modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
            page_count: self.page_count(),
            pdf_version: format!("{:?}", self.document.version()),
        }
    }

    fn page_text(&self, index: usize) -> Result<String, BackendError> {
        let page = self.page(index)?;
        let text = page
            .text()
            .map_err(|e| BackendError::Malformed(format!("{:?}", e)))?;
        Ok(text.all())
    }

    fn page_images(&self, index: usize) -> Result<Vec<Result<RawImage, BackendError>>, BackendError> {
        let page = self.page(index)?;

        let images: Vec<Result<RawImage, BackendError>> = page
            .objects()
            .iter()
            .filter_map(|object| {
                object.as_image_object().map(|image_object| {
                    let decoded = image_object
                        .get_raw_image()
                        .map_err(|e| BackendError::Malformed(format!("{:?}", e)))?;
                    encode::encode_png(&decoded).map_err(|e| BackendError::Malformed(e.to_string()))
                })
            })
            .collect();

        debug!("Page {}: {} image objects", index + 1, images.len());
        Ok(images)
    }

    fn page_image_count(&self, index: usize) -> Result<usize, BackendError> {
        let page = self.page(index)?;
        Ok(page
            .objects()
            .iter()
            .filter(|object| object.as_image_object().is_some())
            .count())
    }
}
