use std::sync::LazyLock;

use regex::Regex;

use super::PageArtifacts;

static DOC_EXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.pdf(\?\S*)?$").unwrap());
static BODY_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)https?://[^\s"'<>)]+\.pdf(?:\?[^\s"'<>)]*)?"#).unwrap());

/// True when an href (or JSON field value) ends in the document extension,
/// allowing a trailing query string.
pub fn is_document_href(href: &str) -> bool {
    DOC_EXT_RE.is_match(href)
}

/// The first link href with the document extension, else the first
/// standalone document URL in the body text. Runs before any script
/// harvesting so a visible link never costs external fetches.
pub fn find_document_link(artifacts: &PageArtifacts) -> Option<String> {
    if let Some(link) = artifacts.links.iter().find(|l| is_document_href(&l.href)) {
        return Some(link.href.clone());
    }
    BODY_URL_RE
        .find(&artifacts.body_text)
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::PageLink;

    fn artifacts(links: Vec<(&str, &str)>, body: &str) -> PageArtifacts {
        PageArtifacts {
            links: links
                .into_iter()
                .map(|(text, href)| PageLink {
                    text: text.to_string(),
                    href: href.to_string(),
                })
                .collect(),
            body_text: body.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn direct_link_wins() {
        let a = artifacts(
            vec![
                ("home", "https://example.com/"),
                ("doc", "https://example.com/q.pdf"),
            ],
            "",
        );
        assert_eq!(
            find_document_link(&a).as_deref(),
            Some("https://example.com/q.pdf")
        );
    }

    #[test]
    fn query_string_allowed() {
        let a = artifacts(vec![("doc", "https://example.com/q.PDF?v=2&x=1")], "");
        assert!(find_document_link(&a).is_some());
    }

    #[test]
    fn body_text_url_fallback() {
        let a = artifacts(
            vec![("home", "https://example.com/")],
            "grab https://cdn.example.com/files/quiz.pdf?sig=abc before it expires",
        );
        assert_eq!(
            find_document_link(&a).as_deref(),
            Some("https://cdn.example.com/files/quiz.pdf?sig=abc")
        );
    }

    #[test]
    fn nothing_found() {
        let a = artifacts(vec![("home", "https://example.com/page.html")], "no docs here");
        assert!(find_document_link(&a).is_none());
    }

    #[test]
    fn pdf_in_path_not_suffix_rejected() {
        let a = artifacts(vec![("x", "https://example.com/pdf/view.html")], "");
        assert!(find_document_link(&a).is_none());
    }
}
