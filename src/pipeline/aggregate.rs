//! Aggregation: walked pages + sink results → one [`DocumentResult`].
//!
//! The Nth placeholder on a page is bound to the Nth image slot of that
//! page. A slot whose image failed to decode or persist, or a placeholder
//! with no slot at all, becomes an "image unavailable" marker instead of a
//! dangling link. Page numbers come straight from the walker and are never
//! renumbered, so they stay contiguous from 1.

use crate::config::{FILE_BREAK, PAGE_BREAK};
use crate::error::{ImageError, PageError};
use crate::output::{DocumentMetadata, DocumentResult, ImageRecord, PageMetadata, PageRecord};
use crate::pipeline::markdown::RE_PLACEHOLDER;
use crate::pipeline::namer::FileNamespace;
use regex::Captures;

/// A page after its images went through the sink.
#[derive(Debug, Clone)]
pub struct ResolvedPage {
    pub page_number: usize,
    /// Walker output, still containing placeholders in Markdown mode.
    pub text: String,
    /// One entry per image slot, in slot order.
    pub slots: Vec<Result<ImageRecord, ImageError>>,
    pub error: Option<PageError>,
}

/// How the document's pages are joined.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateOptions {
    /// Resolve image placeholders (Markdown mode).
    pub markdown: bool,
    /// Head each page with `## Page N`.
    pub split_per_page: bool,
}

/// Build the result for one document.
pub fn aggregate(
    file_name: &str,
    namespace: &FileNamespace,
    metadata: DocumentMetadata,
    pages: Vec<ResolvedPage>,
    options: AggregateOptions,
) -> DocumentResult {
    let mut images = Vec::new();
    let mut image_errors = Vec::new();
    let mut records = Vec::with_capacity(pages.len());

    for page in pages {
        let mut text = if options.markdown {
            escape_markers(&bind_placeholders(&page.text, &page.slots))
        } else {
            page.text
        };
        if options.split_per_page {
            text = format!("## Page {}\n\n{}", page.page_number, text);
        }

        let mut page_images = Vec::new();
        for slot in page.slots {
            match slot {
                Ok(record) => page_images.push(record),
                Err(e) => image_errors.push(e),
            }
        }
        images.extend(page_images.iter().cloned());

        records.push(PageRecord {
            text,
            metadata: PageMetadata {
                page: page.page_number,
                file_name: file_name.to_string(),
            },
            images: page_images,
            error: page.error,
        });
    }

    let content = records
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join(PAGE_BREAK);

    DocumentResult {
        file_name: file_name.to_string(),
        namespace: namespace.to_string(),
        pages: records,
        content,
        paginated: options.split_per_page,
        images,
        image_errors,
        artifacts: Vec::new(),
        metadata,
    }
}

/// Replace each placeholder with a link to its slot's stored image.
pub fn bind_placeholders(text: &str, slots: &[Result<ImageRecord, ImageError>]) -> String {
    let mut next = 0usize;
    RE_PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            let alt = caps.get(1).map_or("", |m| m.as_str());
            let slot = slots.get(next);
            next += 1;
            match slot {
                Some(Ok(record)) => format!("![{}]({})", alt, record.reference.address()),
                _ => unavailable_marker(alt),
            }
        })
        .into_owned()
}

/// Backslash-escape the page and file markers inside Markdown page text, so
/// splitting the joined content on [`PAGE_BREAK`] yields exactly the pages.
/// The escape renders invisibly in Markdown.
pub fn escape_markers(text: &str) -> String {
    let mut out = text.to_string();
    for marker in [PAGE_BREAK.trim(), FILE_BREAK.trim()] {
        if out.contains(marker) {
            out = out.replace(marker, &format!("\\{marker}"));
        }
    }
    out
}

pub fn unavailable_marker(alt: &str) -> String {
    format!("_[Image unavailable: {alt}]_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ImageReference;
    use crate::pipeline::markdown::placeholder;

    fn ns() -> FileNamespace {
        serde_json::from_str("\"report-abcdef012345\"").unwrap()
    }

    fn zip_record(page: usize, index: usize) -> ImageRecord {
        ImageRecord {
            page,
            index,
            mime_type: "image/png".into(),
            reference: ImageReference::Zip {
                entry: format!("report-abcdef012345/page_{page}_{index}.png"),
            },
        }
    }

    fn text_page(n: usize, text: &str) -> ResolvedPage {
        ResolvedPage {
            page_number: n,
            text: text.into(),
            slots: vec![],
            error: None,
        }
    }

    #[test]
    fn text_pages_join_with_page_break() {
        let doc = aggregate(
            "a.pdf",
            &ns(),
            DocumentMetadata::default(),
            vec![text_page(1, "one"), text_page(2, "two"), text_page(3, "three")],
            AggregateOptions::default(),
        );
        assert_eq!(doc.content.matches(PAGE_BREAK).count(), 2);
        let numbers: Vec<_> = doc.pages.iter().map(|p| p.page_number()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(doc.content.split(PAGE_BREAK).collect::<Vec<_>>(), vec!["one", "two", "three"]);
    }

    #[test]
    fn placeholders_bind_positionally() {
        let text = format!("Figure\n\n{}\n\n{}", placeholder(2, 0), placeholder(2, 1));
        let slots = vec![
            Ok(zip_record(2, 0)),
            Err(ImageError::PersistFailed {
                page: 2,
                index: 1,
                detail: "duplicate entry".into(),
            }),
        ];
        let bound = bind_placeholders(&text, &slots);
        assert!(bound.contains("![Page 2 Image 1](report-abcdef012345/page_2_0.png)"));
        assert!(bound.contains("_[Image unavailable: Page 2 Image 2]_"));
        assert!(!RE_PLACEHOLDER.is_match(&bound));
    }

    #[test]
    fn markdown_pages_escape_embedded_markers() {
        let tricky = format!("before{PAGE_BREAK}after{FILE_BREAK}end");
        let doc = aggregate(
            "a.pdf",
            &ns(),
            DocumentMetadata::default(),
            vec![text_page(1, &tricky), text_page(2, "two")],
            AggregateOptions {
                markdown: true,
                split_per_page: false,
            },
        );
        let parts: Vec<_> = doc.content.split(PAGE_BREAK).collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], doc.pages[0].text);
        assert!(!parts[0].contains(FILE_BREAK));
        assert!(parts[0].contains("\\---PAGE BREAK---"));
    }

    #[test]
    fn text_pages_stay_verbatim() {
        let tricky = format!("before{PAGE_BREAK}after");
        let doc = aggregate(
            "a.pdf",
            &ns(),
            DocumentMetadata::default(),
            vec![text_page(1, &tricky)],
            AggregateOptions::default(),
        );
        assert_eq!(doc.pages[0].text, tricky);
    }

    #[test]
    fn surplus_placeholder_becomes_marker() {
        let text = placeholder(1, 0);
        assert_eq!(bind_placeholders(&text, &[]), "_[Image unavailable: Page 1 Image 1]_");
    }

    #[test]
    fn split_per_page_adds_headings() {
        let doc = aggregate(
            "a.pdf",
            &ns(),
            DocumentMetadata::default(),
            vec![text_page(1, "one"), text_page(2, "two")],
            AggregateOptions {
                markdown: true,
                split_per_page: true,
            },
        );
        assert!(doc.paginated);
        assert_eq!(doc.pages[1].text, "## Page 2\n\ntwo");
    }

    #[test]
    fn image_errors_are_collected_and_records_kept() {
        let page = ResolvedPage {
            page_number: 2,
            text: format!("{}\n\n{}", placeholder(2, 0), placeholder(2, 1)),
            slots: vec![
                Err(ImageError::DecodeFailed {
                    page: 2,
                    index: 0,
                    detail: "jbig2".into(),
                }),
                Ok(zip_record(2, 1)),
            ],
            error: None,
        };
        let doc = aggregate(
            "a.pdf",
            &ns(),
            DocumentMetadata::default(),
            vec![text_page(1, "intro"), page],
            AggregateOptions {
                markdown: true,
                split_per_page: false,
            },
        );
        assert_eq!(doc.images.len(), 1);
        assert_eq!(doc.image_errors.len(), 1);
        assert!(doc.is_degraded());
        assert_eq!(doc.pages[1].images[0].index, 1);
        assert!(doc.pages[1].text.contains("(report-abcdef012345/page_2_1.png)"));
    }
}
