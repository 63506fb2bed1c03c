//! Document walking: open one input through the backend and produce its
//! pages in order, each with the images found on it.
//!
//! ## Failure scopes
//!
//! * The document fails as a whole when it is not a PDF, cannot be opened
//!   (encrypted, corrupt header) or the backend reports the stream as
//!   corrupt mid-walk. The batch is never affected.
//! * A page whose text cannot be read stays in the output with empty text
//!   and a [`PageError`], so page numbers remain contiguous.
//! * An image that cannot be decoded keeps its slot (and therefore its
//!   placeholder) and carries an [`ImageError`].
//!
//! Every backend call is blocking; [`walk_document`] runs the whole walk
//! inside `tokio::task::spawn_blocking`.

use crate::backend::{BackendError, PdfBackend, PdfSource};
use crate::config::ExtractionMode;
use crate::error::{DocumentError, ImageError, PageError};
use crate::output::{DocumentMetadata, ExtractedImage};
use crate::pipeline::markdown::{MarkdownRenderer, PageContent};
use crate::pipeline::namer::FileNamespace;
use std::sync::Arc;
use tracing::{debug, warn};

const PDF_MAGIC: &[u8] = b"%PDF";

/// Readers accept the header anywhere in the first kilobyte.
const HEADER_WINDOW: usize = 1024;

fn has_pdf_header(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(HEADER_WINDOW)]
        .windows(PDF_MAGIC.len())
        .any(|w| w == PDF_MAGIC)
}

/// What the walker produces for each page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFormat {
    /// Verbatim page text, no images.
    Text,
    /// Rendered Markdown; images are enumerated only when `images` is set.
    Markdown { images: bool },
}

impl PageFormat {
    pub fn for_mode(mode: &ExtractionMode) -> Self {
        match mode {
            ExtractionMode::Text => PageFormat::Text,
            ExtractionMode::Markdown(opts) => PageFormat::Markdown {
                images: opts.save_images,
            },
        }
    }
}

/// One enumerated image slot on a page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 0-indexed position among the page's images.
    pub sequence_in_page: usize,
    pub outcome: Result<ExtractedImage, ImageError>,
}

/// One page as produced by the walker, before images are persisted.
#[derive(Debug, Clone)]
pub struct WalkedPage {
    /// 1-indexed page number.
    pub page_number: usize,
    /// Verbatim text, or Markdown containing one placeholder per image slot.
    pub text: String,
    pub images: Vec<PageImage>,
    pub error: Option<PageError>,
}

/// A fully walked document.
#[derive(Debug, Clone)]
pub struct WalkedDocument {
    pub metadata: DocumentMetadata,
    pub pages: Vec<WalkedPage>,
}

/// An opened document ready to be walked.
pub struct DocumentWalker<'a> {
    source: Box<dyn PdfSource + 'a>,
    namespace: FileNamespace,
}

impl<'a> DocumentWalker<'a> {
    /// Check the signature and open `bytes` through `backend`.
    pub fn open(
        backend: &'a dyn PdfBackend,
        bytes: &'a [u8],
        password: Option<&str>,
        namespace: FileNamespace,
    ) -> Result<Self, DocumentError> {
        if !has_pdf_header(bytes) {
            return Err(DocumentError::NotAPdf {
                magic: bytes.iter().take(8).copied().collect(),
            });
        }

        let source = backend.open(bytes, password).map_err(|e| match e {
            BackendError::PasswordRequired => DocumentError::PasswordRequired,
            BackendError::WrongPassword => DocumentError::WrongPassword,
            BackendError::Malformed(detail) | BackendError::Corrupt(detail) => {
                DocumentError::Corrupt { detail }
            }
        })?;

        Ok(Self { source, namespace })
    }

    pub fn page_count(&self) -> usize {
        self.source.page_count()
    }

    pub fn metadata(&self) -> DocumentMetadata {
        self.source.metadata()
    }

    /// Iterate the pages from the first one. Each call starts a fresh pass.
    pub fn pages<'w>(
        &'w self,
        format: PageFormat,
        renderer: &'w dyn MarkdownRenderer,
    ) -> Pages<'w, 'a> {
        Pages {
            walker: self,
            format,
            renderer,
            next_index: 0,
            done: false,
        }
    }

    fn walk_page(
        &self,
        index: usize,
        format: PageFormat,
        renderer: &dyn MarkdownRenderer,
    ) -> Result<WalkedPage, DocumentError> {
        let page_number = index + 1;
        let mut error = None;

        let text = match self.source.page_text(index) {
            Ok(text) => text,
            Err(BackendError::Corrupt(detail)) => {
                return Err(DocumentError::Aborted {
                    page: page_number,
                    detail,
                })
            }
            Err(e) => {
                warn!("Page {}: text extraction failed: {}", page_number, e);
                error = Some(PageError::ExtractionFailed {
                    page: page_number,
                    detail: e.to_string(),
                });
                String::new()
            }
        };

        let images = match format {
            PageFormat::Markdown { images: true } => match self.source.page_images(index) {
                Ok(raw) => self.collect_images(page_number, raw),
                Err(BackendError::Corrupt(detail)) => {
                    return Err(DocumentError::Aborted {
                        page: page_number,
                        detail,
                    })
                }
                Err(e) => {
                    warn!("Page {}: image enumeration failed: {}", page_number, e);
                    if error.is_none() {
                        error = Some(PageError::ImagesUnavailable {
                            page: page_number,
                            detail: e.to_string(),
                        });
                    }
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };

        let text = match format {
            PageFormat::Text => text,
            PageFormat::Markdown { images: extracting } => {
                let skipped_images = if extracting {
                    0
                } else {
                    self.source.page_image_count(index).unwrap_or_else(|e| {
                        debug!("Page {}: image count unavailable: {}", page_number, e);
                        0
                    })
                };
                renderer.render_page(&PageContent {
                    page_number,
                    text: &text,
                    image_count: images.len(),
                    skipped_images,
                })
            }
        };

        debug!(
            "Page {}: {} chars, {} image slots",
            page_number,
            text.len(),
            images.len()
        );

        Ok(WalkedPage {
            page_number,
            text,
            images,
            error,
        })
    }

    fn collect_images(
        &self,
        page_number: usize,
        raw: Vec<Result<crate::backend::RawImage, BackendError>>,
    ) -> Vec<PageImage> {
        raw.into_iter()
            .enumerate()
            .map(|(seq, result)| PageImage {
                sequence_in_page: seq,
                outcome: result
                    .map(|img| ExtractedImage {
                        namespace: self.namespace.clone(),
                        page_number,
                        sequence_in_page: seq,
                        bytes: img.bytes,
                        mime_type: img.mime_type,
                        extension: img.extension,
                    })
                    .map_err(|e| ImageError::DecodeFailed {
                        page: page_number,
                        index: seq,
                        detail: e.to_string(),
                    }),
            })
            .collect()
    }
}

/// Lazy page iterator returned by [`DocumentWalker::pages`].
///
/// Yields `Err` at most once, after which the document is over.
pub struct Pages<'w, 'a> {
    walker: &'w DocumentWalker<'a>,
    format: PageFormat,
    renderer: &'w dyn MarkdownRenderer,
    next_index: usize,
    done: bool,
}

impl Iterator for Pages<'_, '_> {
    type Item = Result<WalkedPage, DocumentError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next_index >= self.walker.page_count() {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;

        let page = self.walker.walk_page(index, self.format, self.renderer);
        if page.is_err() {
            self.done = true;
        }
        Some(page)
    }
}

/// Walk a whole document on the blocking pool.
pub async fn walk_document(
    backend: Arc<dyn PdfBackend>,
    renderer: Arc<dyn MarkdownRenderer>,
    bytes: Arc<Vec<u8>>,
    password: Option<String>,
    namespace: FileNamespace,
    format: PageFormat,
) -> Result<WalkedDocument, DocumentError> {
    tokio::task::spawn_blocking(move || -> Result<WalkedDocument, DocumentError> {
        let walker = DocumentWalker::open(
            backend.as_ref(),
            bytes.as_slice(),
            password.as_deref(),
            namespace,
        )?;
        let metadata = walker.metadata();
        let pages = walker
            .pages(format, renderer.as_ref())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(WalkedDocument { metadata, pages })
    })
    .await
    .map_err(|e| DocumentError::Internal {
        detail: format!("walk task failed: {e}"),
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RawImage;
    use crate::pipeline::markdown::{TextLayoutRenderer, RE_PLACEHOLDER, SKIPPED_IMAGES_NOTICE};

    struct StubBackend {
        pages: Vec<Result<&'static str, BackendError>>,
        images: Vec<Vec<Result<RawImage, BackendError>>>,
    }

    struct StubSource<'a>(&'a StubBackend);

    impl PdfBackend for StubBackend {
        fn open<'a>(
            &'a self,
            _bytes: &'a [u8],
            password: Option<&str>,
        ) -> Result<Box<dyn PdfSource + 'a>, BackendError> {
            match password {
                Some("wrong") => Err(BackendError::WrongPassword),
                _ => Ok(Box::new(StubSource(self))),
            }
        }
    }

    impl PdfSource for StubSource<'_> {
        fn page_count(&self) -> usize {
            self.0.pages.len()
        }

        fn metadata(&self) -> DocumentMetadata {
            DocumentMetadata {
                page_count: self.page_count(),
                ..Default::default()
            }
        }

        fn page_text(&self, index: usize) -> Result<String, BackendError> {
            self.0.pages[index].clone().map(str::to_string)
        }

        fn page_images(
            &self,
            index: usize,
        ) -> Result<Vec<Result<RawImage, BackendError>>, BackendError> {
            Ok(self.0.images.get(index).cloned().unwrap_or_default())
        }
    }

    fn png() -> RawImage {
        RawImage {
            bytes: vec![0x89, b'P', b'N', b'G'],
            mime_type: "image/png".into(),
            extension: "png".into(),
        }
    }

    fn ns() -> FileNamespace {
        serde_json::from_str("\"doc-000000000000\"").unwrap()
    }

    #[test]
    fn rejects_non_pdf() {
        let backend = StubBackend {
            pages: vec![],
            images: vec![],
        };
        let err = DocumentWalker::open(&backend, b"PK\x03\x04zip", None, ns())
            .err()
            .unwrap();
        assert!(matches!(err, DocumentError::NotAPdf { .. }));
    }

    #[test]
    fn header_after_bom_is_accepted() {
        let backend = StubBackend {
            pages: vec![Ok("a")],
            images: vec![],
        };
        let walker =
            DocumentWalker::open(&backend, b"\xEF\xBB\xBF\r\n%PDF-1.7\n", None, ns()).unwrap();
        assert_eq!(walker.page_count(), 1);

        let mut late = vec![b' '; HEADER_WINDOW];
        late.extend_from_slice(b"%PDF-1.7");
        let err = DocumentWalker::open(&backend, &late, None, ns()).err().unwrap();
        assert!(matches!(err, DocumentError::NotAPdf { .. }));
    }

    #[test]
    fn wrong_password_is_document_error() {
        let backend = StubBackend {
            pages: vec![Ok("a")],
            images: vec![],
        };
        let err = DocumentWalker::open(&backend, b"%PDF-1.7", Some("wrong"), ns())
            .err()
            .unwrap();
        assert_eq!(err, DocumentError::WrongPassword);
    }

    #[test]
    fn text_pages_are_verbatim_and_restartable() {
        let backend = StubBackend {
            pages: vec![Ok("one  "), Ok("two"), Ok("three")],
            images: vec![],
        };
        let walker = DocumentWalker::open(&backend, b"%PDF-1.7", None, ns()).unwrap();
        let first: Vec<_> = walker
            .pages(PageFormat::Text, &TextLayoutRenderer)
            .map(|p| p.unwrap().text)
            .collect();
        assert_eq!(first, vec!["one  ", "two", "three"]);

        let again = walker.pages(PageFormat::Text, &TextLayoutRenderer).count();
        assert_eq!(again, 3);
    }

    #[test]
    fn malformed_page_keeps_its_slot() {
        let backend = StubBackend {
            pages: vec![Ok("a"), Err(BackendError::Malformed("bad ops".into())), Ok("c")],
            images: vec![],
        };
        let walker = DocumentWalker::open(&backend, b"%PDF-1.7", None, ns()).unwrap();
        let pages: Vec<_> = walker
            .pages(PageFormat::Text, &TextLayoutRenderer)
            .map(Result::unwrap)
            .collect();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[1].page_number, 2);
        assert!(pages[1].text.is_empty());
        assert!(matches!(
            pages[1].error,
            Some(PageError::ExtractionFailed { page: 2, .. })
        ));
    }

    #[test]
    fn corrupt_stream_aborts_document() {
        let backend = StubBackend {
            pages: vec![Ok("a"), Err(BackendError::Corrupt("xref".into())), Ok("c")],
            images: vec![],
        };
        let walker = DocumentWalker::open(&backend, b"%PDF-1.7", None, ns()).unwrap();
        let results: Vec<_> = walker.pages(PageFormat::Text, &TextLayoutRenderer).collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[1],
            Err(DocumentError::Aborted { page: 2, .. })
        ));
    }

    #[test]
    fn markdown_pages_carry_image_slots() {
        let backend = StubBackend {
            pages: vec![Ok("intro"), Ok("figure")],
            images: vec![
                vec![],
                vec![Ok(png()), Err(BackendError::Malformed("jbig2".into()))],
            ],
        };
        let walker = DocumentWalker::open(&backend, b"%PDF-1.7", None, ns()).unwrap();
        let pages: Vec<_> = walker
            .pages(PageFormat::Markdown { images: true }, &TextLayoutRenderer)
            .map(Result::unwrap)
            .collect();

        assert!(pages[0].images.is_empty());
        assert_eq!(pages[1].images.len(), 2);
        assert_eq!(RE_PLACEHOLDER.find_iter(&pages[1].text).count(), 2);

        let first = pages[1].images[0].outcome.as_ref().unwrap();
        assert_eq!(first.entry_name(), "doc-000000000000/page_2_0.png");
        assert!(matches!(
            pages[1].images[1].outcome,
            Err(ImageError::DecodeFailed { page: 2, index: 1, .. })
        ));
    }

    #[test]
    fn markdown_without_images_notes_the_skipped_ones() {
        let backend = StubBackend {
            pages: vec![Ok("figure"), Ok("plain")],
            images: vec![vec![Ok(png()), Err(BackendError::Malformed("jbig2".into()))]],
        };
        let walker = DocumentWalker::open(&backend, b"%PDF-1.7", None, ns()).unwrap();
        let pages: Vec<_> = walker
            .pages(PageFormat::Markdown { images: false }, &TextLayoutRenderer)
            .map(Result::unwrap)
            .collect();

        assert!(pages.iter().all(|p| p.images.is_empty()));
        assert_eq!(pages[0].text, format!("figure\n\n{}", SKIPPED_IMAGES_NOTICE));
        assert_eq!(RE_PLACEHOLDER.find_iter(&pages[0].text).count(), 0);
        assert_eq!(pages[1].text, "plain");
    }
}
