//! Post-processing: deterministic cleanup of extracted page text before it
//! becomes Markdown.
//!
//! Text pulled out of a PDF content stream carries layout debris: CRLF line
//! ends, trailing spaces from justified columns, soft hyphens, runs of blank
//! lines where whitespace objects sat, and bullet glyphs Markdown does not
//! recognise. Each rule below is a pure `&str → String` pass.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so every later rule can split on `\n`;
//! image syntax is escaped before anything could introduce a placeholder;
//! blank-line collapsing runs after trimming so whitespace-only lines count
//! as blank.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to one page of extracted text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Trim trailing whitespace per line
/// 4. Turn bullet glyphs (`•`, `▪`, `◦`, …) into `- ` list items
/// 5. Escape literal `![` so page text can never forge an image link
/// 6. Collapse 2+ consecutive blank lines down to 1
/// 7. Trim leading and trailing blank lines
pub fn clean_page_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = normalise_bullets(&s);
    let s = escape_image_syntax(&s);
    let s = collapse_blank_lines(&s);
    s.trim_matches('\n').to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Bullet glyphs → Markdown list items ─────────────────────────────

static RE_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([ \t]*)[•▪◦‣●○■□–][ \t]*").unwrap());

fn normalise_bullets(input: &str) -> String {
    RE_BULLET.replace_all(input, "$1- ").to_string()
}

// ── Rule 5: Escape literal image syntax ─────────────────────────────────────

fn escape_image_syntax(input: &str) -> String {
    input.replace("![", "\\![")
}

// ── Rule 6: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(
            trim_trailing_whitespace("  hello   \nworld  "),
            "  hello\nworld"
        );
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_bullets() {
        assert_eq!(normalise_bullets("• one\n  ◦ two"), "- one\n  - two");
        assert_eq!(normalise_bullets("a • b"), "a • b");
    }

    #[test]
    fn test_escape_image_syntax() {
        assert_eq!(escape_image_syntax("see ![x](y)"), "see \\![x](y)");
    }

    #[test]
    fn test_clean_page_text_full_pipeline() {
        let input = "\r\n\r\nTitle  \r\n\r\n\r\n\r\n• first\u{200B}\r\n• second\r\n\r\n";
        assert_eq!(clean_page_text(input), "Title\n\n- first\n- second");
    }

    #[test]
    fn test_clean_empty() {
        assert_eq!(clean_page_text("  \n \n"), "");
    }
}
