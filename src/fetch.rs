use std::time::Duration;

use anyhow::{Context, Result};

const USER_AGENT: &str = concat!("quiz_solver/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with a per-request timeout. One client per job.
pub fn client(timeout_ms: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .user_agent(USER_AGENT)
        .build()
        .context("failed to build HTTP client")
}

/// Fetch a text resource. Non-2xx statuses are errors; callers decide
/// whether that is fatal (document download) or skippable (script fetch).
pub async fn text(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("request to {} failed", url))?
        .error_for_status()
        .with_context(|| format!("non-OK status from {}", url))?;
    response
        .text()
        .await
        .with_context(|| format!("failed to read body from {}", url))
}

/// Fetch a binary resource.
pub async fn bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("request to {} failed", url))?
        .error_for_status()
        .with_context(|| format!("non-OK status from {}", url))?;
    let body = response
        .bytes()
        .await
        .with_context(|| format!("failed to read body from {}", url))?;
    Ok(body.to_vec())
}
