use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::Regex;
use tracing::debug;

use super::direct::is_document_href;
use super::ResolvedReference;

/// 4-byte prefix identifying the document format.
const MAGIC: &[u8] = b"%PDF";

/// Minimum stripped length for the heuristic long-blob scan.
const MIN_BLOB_LEN: usize = 300;

static DATA_URI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"data:application/pdf;base64,([A-Za-z0-9+/=\s]+)").unwrap()
});
// The regex crate has no backreferences, so each quote style gets its own
// capture group.
static DECODE_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"atob\(\s*(?:'([^']*)'|"([^"]*)"|`([^`]*)`)\s*\)"#).unwrap()
});
static DOC_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>)]+\.pdf(?:\?[^\s"'<>)]*)?"#).unwrap()
});
static LONG_BLOB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9+/=\s]{300,}").unwrap());

/// Embedded-data strategies over the combined search text, in priority
/// order: data URI, runtime decode calls, long base64 blobs, embedded JSON.
pub fn scan(combined: &str) -> Option<ResolvedReference> {
    find_data_uri(combined)
        .or_else(|| find_decode_call(combined))
        .or_else(|| find_long_blob(combined))
        .or_else(|| find_embedded_json(combined))
}

/// A data URI declaring the document MIME type. The MIME type is taken as
/// sufficient evidence; no magic-byte check.
fn find_data_uri(combined: &str) -> Option<ResolvedReference> {
    let payload = DATA_URI_RE.captures(combined)?.get(1)?.as_str();
    let bytes = BASE64.decode(strip_whitespace(payload)).ok()?;
    debug!("data URI payload decoded ({} bytes)", bytes.len());
    Some(ResolvedReference::InlineBytes(bytes))
}

/// Every atob('…') literal in text order. A decoded payload starting with
/// the magic bytes wins outright; otherwise the decoded text is probed for
/// a document URL, then for a JSON block naming one. Per-candidate failures
/// are swallowed and the scan moves on.
fn find_decode_call(combined: &str) -> Option<ResolvedReference> {
    for caps in DECODE_CALL_RE.captures_iter(combined) {
        let literal = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let Ok(bytes) = BASE64.decode(strip_whitespace(literal)) else {
            continue;
        };
        if bytes.starts_with(MAGIC) {
            debug!("atob literal decoded to document bytes ({})", bytes.len());
            return Some(ResolvedReference::InlineBytes(bytes));
        }
        let text = String::from_utf8_lossy(&bytes);
        if let Some(m) = DOC_URL_RE.find(&text) {
            return Some(ResolvedReference::RemoteUrl(m.as_str().to_string()));
        }
        if let Some(url) = document_field(&text) {
            return Some(ResolvedReference::RemoteUrl(url));
        }
    }
    None
}

/// The first base64-looking run of 300+ chars. One attempt only: a decoded
/// blob without the magic prefix ends the strategy, later blobs are never
/// tried.
fn find_long_blob(combined: &str) -> Option<ResolvedReference> {
    for m in LONG_BLOB_RE.find_iter(combined) {
        let stripped = strip_whitespace(m.as_str());
        if stripped.len() < MIN_BLOB_LEN {
            continue;
        }
        let bytes = BASE64.decode(stripped).ok()?;
        if bytes.starts_with(MAGIC) {
            debug!("long blob decoded to document bytes ({})", bytes.len());
            return Some(ResolvedReference::InlineBytes(bytes));
        }
        return None;
    }
    None
}

/// The first top-level JSON block of the combined text itself.
fn find_embedded_json(combined: &str) -> Option<ResolvedReference> {
    document_field(combined).map(ResolvedReference::RemoteUrl)
}

/// A `url` or `file` field with the document extension in the first
/// top-level `{…}` block of `text`.
fn document_field(text: &str) -> Option<String> {
    let value = first_json_block(text)?;
    ["url", "file"]
        .iter()
        .filter_map(|key| value.get(key)?.as_str())
        .find(|v| is_document_href(v))
        .map(str::to_string)
}

/// A `submit_url` field, or a `url` field with submission intent, in the
/// first top-level JSON block. Captured for the orchestrator independently
/// of document resolution.
pub fn submission_field(text: &str) -> Option<String> {
    let value = first_json_block(text)?;
    if let Some(url) = value.get("submit_url").and_then(|v| v.as_str()) {
        return Some(url.to_string());
    }
    value
        .get("url")
        .and_then(|v| v.as_str())
        .filter(|v| v.to_lowercase().contains("submit"))
        .map(str::to_string)
}

/// Parse the first top-level `{…}` block in `text`. Brace-counted, so
/// nested objects survive; parse failure is a None, not an error.
fn first_json_block(text: &str) -> Option<serde_json::Value> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (i, c) in text[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return serde_json::from_str(&text[start..start + i + 1]).ok();
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(data: &[u8]) -> String {
        BASE64.encode(data)
    }

    #[test]
    fn data_uri_decoded_without_magic_check() {
        let text = format!(
            "var doc = 'data:application/pdf;base64,{}';",
            b64(b"not a real document")
        );
        match scan(&text) {
            Some(ResolvedReference::InlineBytes(bytes)) => {
                assert_eq!(bytes, b"not a real document");
            }
            other => panic!("expected inline bytes, got {:?}", other),
        }
    }

    #[test]
    fn data_uri_payload_may_wrap_lines() {
        let payload = b64(b"%PDF-1.4 test");
        let (a, b) = payload.split_at(8);
        let text = format!("x = \"data:application/pdf;base64,{}\n{}\"", a, b);
        match scan(&text) {
            Some(ResolvedReference::InlineBytes(bytes)) => {
                assert!(bytes.starts_with(b"%PDF"));
            }
            other => panic!("expected inline bytes, got {:?}", other),
        }
    }

    #[test]
    fn decode_call_with_magic_bytes() {
        let text = format!("const d = atob('{}');", b64(b"%PDF-1.7 payload"));
        match scan(&text) {
            Some(ResolvedReference::InlineBytes(bytes)) => {
                assert_eq!(bytes, b"%PDF-1.7 payload");
            }
            other => panic!("expected inline bytes, got {:?}", other),
        }
    }

    #[test]
    fn decode_call_stops_at_first_magic_match() {
        let first = b64(b"%PDF-first");
        let second = b64(b"%PDF-second");
        let text = format!("atob(\"{}\"); atob(\"{}\");", first, second);
        match scan(&text) {
            Some(ResolvedReference::InlineBytes(bytes)) => assert_eq!(bytes, b"%PDF-first"),
            other => panic!("expected inline bytes, got {:?}", other),
        }
    }

    #[test]
    fn decode_call_yielding_url() {
        let text = format!(
            "atob(`{}`)",
            b64(b"fetch it from https://example.com/hidden.pdf now")
        );
        assert_eq!(
            scan(&text),
            Some(ResolvedReference::RemoteUrl(
                "https://example.com/hidden.pdf".to_string()
            ))
        );
    }

    #[test]
    fn decode_call_yielding_json() {
        let text = format!(
            "atob('{}')",
            b64(br#"{"file": "/docs/quiz.pdf", "page": 2}"#)
        );
        assert_eq!(
            scan(&text),
            Some(ResolvedReference::RemoteUrl("/docs/quiz.pdf".to_string()))
        );
    }

    #[test]
    fn malformed_literal_skipped() {
        let good = b64(b"%PDF-ok");
        let text = format!("atob('!!not base64!!'); atob('{}');", good);
        assert!(matches!(
            scan(&text),
            Some(ResolvedReference::InlineBytes(_))
        ));
    }

    #[test]
    fn long_blob_with_magic_accepted() {
        let mut doc = b"%PDF-1.5 ".to_vec();
        doc.resize(400, b'x');
        let text = format!("<blob>{}</blob>", b64(&doc));
        match scan(&text) {
            Some(ResolvedReference::InlineBytes(bytes)) => assert_eq!(bytes, doc),
            other => panic!("expected inline bytes, got {:?}", other),
        }
    }

    #[test]
    fn long_blob_without_magic_single_attempt() {
        let decoy = b64(&vec![b'a'; 400]);
        let mut doc = b"%PDF-1.5 ".to_vec();
        doc.resize(400, b'x');
        // The decoy precedes the real payload; the scan gives up after it.
        let text = format!("<p>{}</p> <p>{}</p>", decoy, b64(&doc));
        assert_eq!(scan(&text), None);
    }

    #[test]
    fn short_blob_ignored() {
        let text = format!("token: {}", b64(b"%PDF but far too short"));
        assert_eq!(scan(&text), None);
    }

    #[test]
    fn embedded_json_url_field() {
        let text = r#"window.config = {"url": "https://example.com/paper.pdf", "debug": false};"#;
        assert_eq!(
            scan(text),
            Some(ResolvedReference::RemoteUrl(
                "https://example.com/paper.pdf".to_string()
            ))
        );
    }

    #[test]
    fn embedded_json_nested_braces() {
        let text = r#"cfg = {"meta": {"page": 3}, "file": "a.pdf"};"#;
        assert_eq!(
            scan(text),
            Some(ResolvedReference::RemoteUrl("a.pdf".to_string()))
        );
    }

    #[test]
    fn submission_field_from_submit_url() {
        let text = r#"{"submit_url": "https://example.com/submit", "file": "x.html"}"#;
        assert_eq!(
            submission_field(text).as_deref(),
            Some("https://example.com/submit")
        );
    }

    #[test]
    fn submission_field_from_url_with_intent() {
        let text = r#"{"url": "https://example.com/api/submit-answer"}"#;
        assert_eq!(
            submission_field(text).as_deref(),
            Some("https://example.com/api/submit-answer")
        );
    }

    #[test]
    fn plain_url_field_is_not_submission() {
        let text = r#"{"url": "https://example.com/landing"}"#;
        assert_eq!(submission_field(text), None);
    }
}
