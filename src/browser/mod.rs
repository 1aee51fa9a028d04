//! Browser capability used by the scraper.
//!
//! The pipeline only needs to open a page, navigate it until the network goes
//! quiet, read the rendered HTML and close it again. `chromium` drives a real
//! headless Chromium; `memory` serves canned pages for development and tests.

pub mod chromium;
pub mod memory;

use crate::config::ScrapeSettings;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

pub use chromium::ChromiumBrowser;
pub use memory::{MemoryBrowser, StaticPage};

/// How long a navigation may take and how quiet the network must be before
/// the page counts as loaded.
#[derive(Debug, Clone, Copy)]
pub struct NavigationOptions {
    pub timeout: Duration,
    pub settle: Duration,
}

impl From<&ScrapeSettings> for NavigationOptions {
    fn from(settings: &ScrapeSettings) -> Self {
        Self {
            timeout: settings.navigation_timeout,
            settle: settings.settle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationResponse {
    pub status: u16,
}

/// A loaded page reduced to what the extractor reads
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: String,
    pub status: u16,
    pub html: String,
}

/// One browser engine instance, shared by every fetch of a run
#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>>;

    /// Shut the engine down. Called once at the end of a run.
    async fn close(&mut self) -> Result<()>;
}

/// A single tab/context
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate and wait for a quiescent network, bounded by `options.timeout`.
    async fn goto(&mut self, url: &str, options: &NavigationOptions) -> Result<NavigationResponse>;

    /// Serialized DOM of the current document
    async fn content(&self) -> Result<String>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Open a fresh page, load `url` and capture its HTML. The page is closed on
/// every path, including navigation and read failures.
pub async fn load_page(
    browser: &dyn Browser,
    url: &str,
    settings: &ScrapeSettings,
) -> Result<RenderedPage> {
    let mut page = browser.new_page().await?;
    let outcome = render(page.as_mut(), url, settings).await;

    if let Err(e) = page.close().await {
        warn!(url = %url, error = %e, "Failed to close page");
    }
    outcome
}

async fn render(page: &mut dyn BrowserPage, url: &str, settings: &ScrapeSettings) -> Result<RenderedPage> {
    let options = NavigationOptions::from(settings);
    let response = page.goto(url, &options).await?;
    debug!(url = %url, status = response.status, "Navigation settled");

    if !settings.slow_mo.is_zero() {
        tokio::time::sleep(settings.slow_mo).await;
    }

    let html = page.content().await?;
    Ok(RenderedPage {
        url: url.to_string(),
        status: response.status,
        html,
    })
}
