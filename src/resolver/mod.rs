pub mod direct;
pub mod scripts;

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use crate::artifacts;
use crate::fetch;

static SUBMIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)submit").unwrap());

/// Everything harvested from the rendered page in one DOM evaluation.
/// Immutable per resolution attempt.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageArtifacts {
    #[serde(default)]
    pub links: Vec<PageLink>,
    #[serde(default)]
    pub forms: Vec<String>,
    #[serde(default)]
    pub inline_scripts: Vec<String>,
    #[serde(default)]
    pub external_scripts: Vec<String>,
    #[serde(default)]
    pub body_text: String,
    /// Resolved after the DOM evaluation, used for relative script sources.
    #[serde(skip)]
    pub base_url: Option<Url>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageLink {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub href: String,
}

/// A resolved document reference: either a URL still to be fetched or bytes
/// already recovered from the page itself.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedReference {
    RemoteUrl(String),
    InlineBytes(Vec<u8>),
}

/// Outcome of one resolution attempt. The submission URL is a companion
/// concern, captured whenever encountered, independent of whether a
/// document was found.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub document: Option<ResolvedReference>,
    pub submission_url: Option<String>,
}

/// Try each strategy in fixed priority order; the first hit wins. The direct
/// link scan runs before any script harvesting, so a visible document link
/// never costs an external fetch.
pub async fn resolve(
    client: &reqwest::Client,
    page: &PageArtifacts,
    debug_dir: Option<&Path>,
) -> Resolution {
    let mut submission_url = find_submission_url(page);

    if let Some(url) = direct::find_document_link(page) {
        info!("document reference via direct link: {}", url);
        return Resolution {
            document: Some(ResolvedReference::RemoteUrl(url)),
            submission_url,
        };
    }

    let combined = combined_search_text(client, page).await;
    if let Some(dir) = debug_dir {
        artifacts::save(dir, "combined_search_text.txt", combined.clone());
    }

    let document = scripts::scan(&combined);
    match &document {
        Some(ResolvedReference::RemoteUrl(url)) => {
            info!("document reference via script scan: {}", url)
        }
        Some(ResolvedReference::InlineBytes(bytes)) => {
            info!("document bytes recovered from scripts ({} bytes)", bytes.len())
        }
        None => info!("no document reference found by any strategy"),
    }

    if submission_url.is_none() {
        submission_url = scripts::submission_field(&combined);
    }

    Resolution {
        document,
        submission_url,
    }
}

/// First link href or form action with submission intent.
pub fn find_submission_url(page: &PageArtifacts) -> Option<String> {
    page.links
        .iter()
        .map(|l| &l.href)
        .chain(page.forms.iter())
        .find(|target| SUBMIT_RE.is_match(target))
        .cloned()
}

/// Concatenate inline script bodies, fetched external script bodies (DOM
/// order, failures skipped), and the body text. Built once per resolution
/// attempt; the fixed order keeps pattern matches reproducible.
async fn combined_search_text(client: &reqwest::Client, page: &PageArtifacts) -> String {
    let mut parts: Vec<String> = page.inline_scripts.clone();

    for src in &page.external_scripts {
        let resolved = match &page.base_url {
            Some(base) => base.join(src).map(|u| u.to_string()),
            None => Url::parse(src).map(|u| u.to_string()),
        };
        let url = match resolved {
            Ok(u) => u,
            Err(e) => {
                warn!("skipping unresolvable script src {}: {}", src, e);
                continue;
            }
        };
        match fetch::text(client, &url).await {
            Ok(body) => parts.push(body),
            Err(e) => warn!("skipping external script {}: {:#}", url, e),
        }
    }

    parts.push(page.body_text.clone());
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(text: &str, href: &str) -> PageLink {
        PageLink {
            text: text.to_string(),
            href: href.to_string(),
        }
    }

    #[tokio::test]
    async fn direct_link_short_circuits_harvesting() {
        // The external script source is unreachable; resolution must not
        // attempt to fetch it when a direct link exists.
        let page = PageArtifacts {
            links: vec![link("quiz", "https://example.com/quiz.pdf")],
            external_scripts: vec!["http://127.0.0.1:1/app.js".to_string()],
            ..Default::default()
        };
        let client = reqwest::Client::new();
        let resolution = resolve(&client, &page, None).await;
        assert_eq!(
            resolution.document,
            Some(ResolvedReference::RemoteUrl(
                "https://example.com/quiz.pdf".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn inline_scripts_scanned_without_network() {
        let page = PageArtifacts {
            inline_scripts: vec![
                "console.log('noise');".to_string(),
                r#"var cfg = {"file": "https://example.com/q.pdf"};"#.to_string(),
            ],
            ..Default::default()
        };
        let client = reqwest::Client::new();
        let resolution = resolve(&client, &page, None).await;
        assert_eq!(
            resolution.document,
            Some(ResolvedReference::RemoteUrl(
                "https://example.com/q.pdf".to_string()
            ))
        );
    }

    #[test]
    fn submission_url_from_link() {
        let page = PageArtifacts {
            links: vec![
                link("home", "https://example.com/"),
                link("send", "https://example.com/submit-answer"),
            ],
            ..Default::default()
        };
        assert_eq!(
            find_submission_url(&page).as_deref(),
            Some("https://example.com/submit-answer")
        );
    }

    #[test]
    fn submission_url_from_form_action() {
        let page = PageArtifacts {
            forms: vec!["/api/submit".to_string()],
            ..Default::default()
        };
        assert_eq!(find_submission_url(&page).as_deref(), Some("/api/submit"));
    }

    #[test]
    fn no_submission_url() {
        let page = PageArtifacts {
            links: vec![link("home", "https://example.com/")],
            ..Default::default()
        };
        assert!(find_submission_url(&page).is_none());
    }
}
