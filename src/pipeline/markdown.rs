//! Page → Markdown rendering with image placeholders.
//!
//! A renderer turns one page's extracted text into Markdown and emits one
//! placeholder link per image enumerated on that page. The placeholder's
//! target is [`IMAGE_PLACEHOLDER`]; the aggregator later binds the Nth
//! placeholder of a page to the Nth image of that page, whatever the sink
//! returned for it.

use crate::pipeline::postprocess;
use once_cell::sync::Lazy;
use regex::Regex;

/// Link target marking an image the aggregator still has to resolve.
pub const IMAGE_PLACEHOLDER: &str = "pdfx-image:pending";

/// Body used when a page has neither text nor images.
pub const EMPTY_PAGE_NOTICE: &str = "_No text content extracted._";

/// Line appended to a page whose images were detected but not extracted.
pub const SKIPPED_IMAGES_NOTICE: &str =
    "_Images detected on this page were skipped (save_images=false)._";

/// Matches `![alt](pdfx-image:pending)`, capturing `alt`.
pub static RE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"!\[([^\]]*)\]\({}\)",
        regex::escape(IMAGE_PLACEHOLDER)
    ))
    .unwrap()
});

/// What a renderer gets to see of a page.
#[derive(Debug, Clone, Copy)]
pub struct PageContent<'a> {
    /// 1-indexed page number.
    pub page_number: usize,
    pub text: &'a str,
    /// Images enumerated on the page, decodable or not.
    pub image_count: usize,
    /// Images present on the page but left out of the extraction.
    pub skipped_images: usize,
}

/// Converts a page into Markdown containing `image_count` placeholders.
pub trait MarkdownRenderer: Send + Sync {
    fn render_page(&self, page: &PageContent<'_>) -> String;
}

/// Placeholder link for the image at `sequence_in_page` (0-based).
pub fn placeholder(page_number: usize, sequence_in_page: usize) -> String {
    format!(
        "![Page {} Image {}]({})",
        page_number,
        sequence_in_page + 1,
        IMAGE_PLACEHOLDER
    )
}

/// Default renderer: cleaned text followed by the page's images in
/// content-stream order.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextLayoutRenderer;

impl MarkdownRenderer for TextLayoutRenderer {
    fn render_page(&self, page: &PageContent<'_>) -> String {
        let body = postprocess::clean_page_text(page.text);

        let mut parts: Vec<String> = Vec::with_capacity(page.image_count + 1);
        if !body.is_empty() {
            parts.push(body);
        } else if page.image_count == 0 {
            parts.push(EMPTY_PAGE_NOTICE.to_string());
        }
        for seq in 0..page.image_count {
            parts.push(placeholder(page.page_number, seq));
        }
        if page.skipped_images > 0 {
            parts.push(SKIPPED_IMAGES_NOTICE.to_string());
        }

        parts.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_text_then_placeholders() {
        let md = TextLayoutRenderer.render_page(&PageContent {
            page_number: 2,
            text: "Hello\r\nworld  ",
            image_count: 2,
            skipped_images: 0,
        });
        assert_eq!(
            md,
            "Hello\nworld\n\n![Page 2 Image 1](pdfx-image:pending)\n\n![Page 2 Image 2](pdfx-image:pending)"
        );
        assert_eq!(RE_PLACEHOLDER.find_iter(&md).count(), 2);
    }

    #[test]
    fn empty_page_gets_notice() {
        let md = TextLayoutRenderer.render_page(&PageContent {
            page_number: 1,
            text: "   ",
            image_count: 0,
            skipped_images: 0,
        });
        assert_eq!(md, EMPTY_PAGE_NOTICE);
    }

    #[test]
    fn image_only_page_has_no_notice() {
        let md = TextLayoutRenderer.render_page(&PageContent {
            page_number: 3,
            text: "",
            image_count: 1,
            skipped_images: 0,
        });
        assert_eq!(md, "![Page 3 Image 1](pdfx-image:pending)");
    }

    #[test]
    fn forged_placeholders_in_text_are_neutralised() {
        let md = TextLayoutRenderer.render_page(&PageContent {
            page_number: 1,
            text: "![evil](pdfx-image:pending)",
            image_count: 0,
            skipped_images: 0,
        });
        assert!(md.starts_with("\\!["));
    }

    #[test]
    fn skipped_images_are_noted_after_the_body() {
        let md = TextLayoutRenderer.render_page(&PageContent {
            page_number: 1,
            text: "Figure below",
            image_count: 0,
            skipped_images: 2,
        });
        assert_eq!(md, format!("Figure below\n\n{}", SKIPPED_IMAGES_NOTICE));
        assert_eq!(RE_PLACEHOLDER.find_iter(&md).count(), 0);
    }

    #[test]
    fn textless_page_with_skipped_images_keeps_both_notices() {
        let md = TextLayoutRenderer.render_page(&PageContent {
            page_number: 4,
            text: "",
            image_count: 0,
            skipped_images: 1,
        });
        assert_eq!(md, format!("{}\n\n{}", EMPTY_PAGE_NOTICE, SKIPPED_IMAGES_NOTICE));
    }
}
