use std::sync::Arc;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use regex::Regex;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use url::Url;

use crate::artifacts;
use crate::browser::PageSession;
use crate::config::Config;
use crate::fetch;
use crate::pdftext;
use crate::resolver::{self, PageArtifacts, ResolvedReference};
use crate::table::{self, PageSum};

/// Literal placeholder posted when no document was resolved but a
/// submission URL is known. Demo path, kept distinguishable in logs.
const DEMO_ANSWER: &str = "demo";

static PAGE_HINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bpage\s+(\d{1,3})\b").unwrap());

/// Validated webhook payload; task-local, never shared across jobs.
#[derive(Debug, Clone)]
pub struct QuizRequest {
    pub email: String,
    pub secret: String,
    pub url: String,
}

/// What one job ended with. `answer` is None when no document was resolved.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub answer: Option<Value>,
    pub submission_url: Option<String>,
    pub submitted: bool,
    pub demo: bool,
}

/// Background entry point: the detached task's own error boundary. Nothing
/// here can reach the webhook response path; outcomes are log-only.
pub async fn run(config: Arc<Config>, request: QuizRequest) {
    info!("quiz job started for {}", request.url);
    match solve(&config, &request, false).await {
        Ok(report) if report.demo => {
            warn!("quiz job fell back to the demo answer, document never resolved")
        }
        Ok(report) => match (&report.answer, report.submitted) {
            (Some(answer), true) => info!("quiz job done, submitted answer {}", answer),
            (Some(answer), false) => warn!(
                "quiz job computed answer {} but found no submission URL",
                answer
            ),
            (None, _) => warn!("quiz job found neither document nor submission URL"),
        },
        Err(e) => error!("quiz job failed: {:#}", e),
    }
}

/// Run the whole pipeline under the job deadline. The browser session is
/// released on every exit path: completion, error, and deadline expiry.
pub async fn solve(config: &Config, request: &QuizRequest, dry_run: bool) -> Result<JobReport> {
    let started = Instant::now();
    let deadline = Duration::from_secs(config.job_deadline_secs);

    let session = PageSession::launch(config).await?;
    let remaining = deadline.saturating_sub(started.elapsed());
    let outcome = tokio::time::timeout(remaining, drive(config, request, &session, dry_run)).await;
    session.close().await;

    match outcome {
        Ok(report) => report,
        Err(_) => Err(anyhow!(
            "job deadline of {}s expired",
            config.job_deadline_secs
        )),
    }
}

async fn drive(
    config: &Config,
    request: &QuizRequest,
    session: &PageSession,
    dry_run: bool,
) -> Result<JobReport> {
    let client = fetch::client(config.fetch_timeout_ms)?;
    let debug_dir = artifacts::job_dir(&config.artifacts_dir);

    session.goto(&request.url).await?;
    let page = session.artifacts().await?;
    match session.rendered_markup().await {
        Ok(markup) => artifacts::save(&debug_dir, "page.html", markup),
        Err(e) => warn!("could not capture rendered markup: {:#}", e),
    }
    let link_list: String = page
        .links
        .iter()
        .map(|l| format!("{}\t{}\n", l.text, l.href))
        .collect();
    artifacts::save(&debug_dir, "links.txt", link_list);

    let resolution = resolver::resolve(&client, &page, Some(&debug_dir)).await;
    let submission_url = resolution
        .submission_url
        .map(|u| absolutize(&page, &u));

    let Some(document) = resolution.document else {
        // Demo fallback: no document, but an endpoint to answer to.
        return match &submission_url {
            Some(url) => {
                warn!("document unresolved, posting demo answer to {}", url);
                let submitted = !dry_run
                    && submit(&client, url, request, Value::String(DEMO_ANSWER.into())).await;
                Ok(JobReport {
                    answer: None,
                    submission_url,
                    submitted,
                    demo: true,
                })
            }
            None => Ok(JobReport {
                answer: None,
                submission_url: None,
                submitted: false,
                demo: false,
            }),
        };
    };

    let bytes = match document {
        ResolvedReference::RemoteUrl(url) => {
            let url = absolutize(&page, &url);
            info!("downloading document from {}", url);
            fetch::bytes(&client, &url).await?
        }
        ResolvedReference::InlineBytes(bytes) => bytes,
    };

    let text = pdftext::decode(&bytes)?;
    let wanted = page_hint(&page.body_text).unwrap_or(1);
    let page_text = match pdftext::page(&text, wanted) {
        Some(t) => t,
        None => {
            warn!("page {} not in document, using page 1", wanted);
            pdftext::page(&text, 1).unwrap_or_default()
        }
    };

    let sum = table::sum_value_column(page_text);
    match sum {
        PageSum::Table(total) => info!("value column sum on page {}: {}", wanted, total),
        PageSum::Fallback(total) => warn!(
            "no value-column header on page {}; low-confidence all-numbers sum: {}",
            wanted, total
        ),
    }
    let answer = table::answer_value(sum.value());

    let submitted = match &submission_url {
        Some(url) => !dry_run && submit(&client, url, request, answer.clone()).await,
        None => false,
    };

    Ok(JobReport {
        answer: Some(answer),
        submission_url,
        submitted,
        demo: false,
    })
}

/// POST the answer. Failures are logged; the job is still finished, no
/// retry anywhere in this system.
async fn submit(
    client: &reqwest::Client,
    url: &str,
    request: &QuizRequest,
    answer: Value,
) -> bool {
    let payload = json!({
        "email": request.email,
        "secret": request.secret,
        "url": request.url,
        "answer": answer,
    });
    match client.post(url).json(&payload).send().await {
        Ok(response) => {
            info!("answer submitted to {}, status {}", url, response.status());
            true
        }
        Err(e) => {
            warn!("answer submission to {} failed: {}", url, e);
            false
        }
    }
}

/// Which document page the quiz text points at, e.g. "the table on page 3".
fn page_hint(body_text: &str) -> Option<usize> {
    PAGE_HINT_RE
        .captures(body_text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Resolve a possibly relative reference against the final page URL.
fn absolutize(page: &PageArtifacts, href: &str) -> String {
    match &page.base_url {
        Some(base) => base
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string()),
        None => Url::parse(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_hint_found() {
        assert_eq!(
            page_hint("Sum the Value column of the table on page 3 of the PDF."),
            Some(3)
        );
    }

    #[test]
    fn page_hint_case_insensitive() {
        assert_eq!(page_hint("See Page 12 for details"), Some(12));
    }

    #[test]
    fn page_hint_absent() {
        assert_eq!(page_hint("sum the value column of the table"), None);
    }

    #[test]
    fn absolutize_relative_against_base() {
        let page = PageArtifacts {
            base_url: Some(Url::parse("https://example.com/quiz/834").unwrap()),
            ..Default::default()
        };
        assert_eq!(
            absolutize(&page, "/files/doc.pdf"),
            "https://example.com/files/doc.pdf"
        );
    }

    #[test]
    fn absolutize_keeps_absolute() {
        let page = PageArtifacts::default();
        assert_eq!(
            absolutize(&page, "https://cdn.example.com/doc.pdf"),
            "https://cdn.example.com/doc.pdf"
        );
    }
}
