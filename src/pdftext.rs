use anyhow::{Context, Result};
use lopdf::Document;
use tracing::warn;

/// Pages in the decoded text are separated by a form feed, pdftotext-style.
pub const PAGE_DELIMITER: char = '\u{0c}';

/// Decode PDF bytes into plain text with form-feed page boundaries.
/// Per-page extraction failures leave an empty segment so later pages keep
/// their positions; an unparsable document is an error.
pub fn decode(bytes: &[u8]) -> Result<String> {
    let doc = Document::load_mem(bytes).context("failed to parse PDF document")?;
    let mut pages = Vec::new();
    for page_no in doc.get_pages().keys() {
        match doc.extract_text(&[*page_no]) {
            Ok(text) => pages.push(text),
            Err(e) => {
                warn!("text extraction failed for page {}: {}", page_no, e);
                pages.push(String::new());
            }
        }
    }
    Ok(pages.join(&PAGE_DELIMITER.to_string()))
}

/// Segment `number` (1-based) of a form-feed-delimited document text.
pub fn page(text: &str, number: usize) -> Option<&str> {
    text.split(PAGE_DELIMITER).nth(number.checked_sub(1)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_segments() {
        let text = "first\u{0c}second\u{0c}third";
        assert_eq!(page(text, 1), Some("first"));
        assert_eq!(page(text, 2), Some("second"));
        assert_eq!(page(text, 3), Some("third"));
        assert_eq!(page(text, 4), None);
    }

    #[test]
    fn page_zero_is_invalid() {
        assert_eq!(page("only", 0), None);
    }

    #[test]
    fn single_page_document() {
        assert_eq!(page("whole text", 1), Some("whole text"));
    }
}
