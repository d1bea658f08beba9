use anyhow::{anyhow, Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::warn;
use url::Url;

use crate::config::Config;
use crate::resolver::PageArtifacts;

/// One DOM pass collecting everything the resolver needs.
const ARTIFACTS_JS: &str = r#"
(() => ({
    links: Array.from(document.querySelectorAll('a[href]'))
        .map(a => ({ text: (a.textContent || '').trim(), href: a.href })),
    forms: Array.from(document.querySelectorAll('form[action]'))
        .map(f => f.getAttribute('action')),
    inlineScripts: Array.from(document.querySelectorAll('script:not([src])'))
        .map(s => s.textContent || ''),
    externalScripts: Array.from(document.querySelectorAll('script[src]'))
        .map(s => s.getAttribute('src')),
    bodyText: document.body ? document.body.innerText : '',
}))()
"#;

/// A headless browser session owned exclusively by one job. The CDP event
/// handler runs on its own task until the session closes.
pub struct PageSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl PageSession {
    pub async fn launch(config: &Config) -> Result<Self> {
        let mut builder = BrowserConfig::builder().no_sandbox();
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder
            .build()
            .map_err(|e| anyhow!("invalid browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("failed to launch browser")?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to open page")?;

        Ok(Self {
            browser,
            page,
            handler_task,
        })
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("navigation to {} failed", url))?;
        // Best effort: some pages finish loading via a late redirect.
        let _ = self.page.wait_for_navigation().await;
        Ok(())
    }

    /// Evaluate the artifact extractor in the page and attach the final page
    /// URL as the base for relative references.
    pub async fn artifacts(&self) -> Result<PageArtifacts> {
        let evaluated = self
            .page
            .evaluate(ARTIFACTS_JS)
            .await
            .context("artifact extraction failed")?;
        let mut artifacts: PageArtifacts = evaluated
            .into_value()
            .context("unexpected artifact shape from page")?;
        artifacts.base_url = self
            .page
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|u| Url::parse(&u).ok());
        Ok(artifacts)
    }

    /// Full rendered markup, for debug artifacts.
    pub async fn rendered_markup(&self) -> Result<String> {
        self.page.content().await.context("failed to read page content")
    }

    /// Release the browser. Called on every job exit path.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("browser close failed: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}
