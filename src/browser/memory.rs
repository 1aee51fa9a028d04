use super::{Browser, BrowserPage, NavigationOptions, NavigationResponse};
use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A canned response for one URL
#[derive(Debug, Clone)]
pub enum StaticPage {
    Html { status: u16, body: String },
    /// Navigation fails with this message
    Fail(String),
}

impl StaticPage {
    pub fn ok(body: impl Into<String>) -> Self {
        StaticPage::Html {
            status: 200,
            body: body.into(),
        }
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        StaticPage::Html {
            status,
            body: body.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        StaticPage::Fail(message.into())
    }
}

#[derive(Debug, Default)]
struct Shared {
    open: AtomicUsize,
    max_open: AtomicUsize,
    opened_total: AtomicUsize,
    visits: Mutex<Vec<String>>,
}

/// In-memory browser for development/testing. Serves pages from a URL map
/// and keeps counters on page usage so callers can check lifecycle and
/// concurrency behaviour.
#[derive(Debug, Default)]
pub struct MemoryBrowser {
    pages: Arc<HashMap<String, StaticPage>>,
    latency: Duration,
    shared: Arc<Shared>,
    closed: bool,
}

impl MemoryBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, page: StaticPage) -> Self {
        Arc::make_mut(&mut self.pages).insert(url.into(), page);
        self
    }

    /// Every navigation takes this long before resolving
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn open_pages(&self) -> usize {
        self.shared.open.load(Ordering::SeqCst)
    }

    /// Highest number of pages that were open at the same time
    pub fn max_open_pages(&self) -> usize {
        self.shared.max_open.load(Ordering::SeqCst)
    }

    pub fn pages_opened(&self) -> usize {
        self.shared.opened_total.load(Ordering::SeqCst)
    }

    /// URLs navigated to, in navigation order
    pub fn visits(&self) -> Vec<String> {
        self.shared.visits.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl Browser for MemoryBrowser {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>> {
        if self.closed {
            return Err(ScraperError::Browser("browser already closed".into()));
        }
        let open = self.shared.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_open.fetch_max(open, Ordering::SeqCst);
        self.shared.opened_total.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemoryPage {
            pages: Arc::clone(&self.pages),
            latency: self.latency,
            shared: Arc::clone(&self.shared),
            current: None,
        }))
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

struct MemoryPage {
    pages: Arc<HashMap<String, StaticPage>>,
    latency: Duration,
    shared: Arc<Shared>,
    current: Option<String>,
}

#[async_trait]
impl BrowserPage for MemoryPage {
    async fn goto(&mut self, url: &str, options: &NavigationOptions) -> Result<NavigationResponse> {
        if let Ok(mut visits) = self.shared.visits.lock() {
            visits.push(url.to_string());
        }

        let latency = self.latency;
        let loaded = tokio::time::timeout(options.timeout, async move {
            tokio::time::sleep(latency).await;
        })
        .await;
        if loaded.is_err() {
            return Err(ScraperError::navigation(
                url,
                format!("timed out after {}ms", options.timeout.as_millis()),
            ));
        }

        match self.pages.get(url) {
            Some(StaticPage::Html { status, body }) => {
                self.current = Some(body.clone());
                Ok(NavigationResponse { status: *status })
            }
            Some(StaticPage::Fail(message)) => Err(ScraperError::navigation(url, message)),
            None => Err(ScraperError::navigation(url, "net::ERR_NAME_NOT_RESOLVED")),
        }
    }

    async fn content(&self) -> Result<String> {
        self.current
            .clone()
            .ok_or_else(|| ScraperError::Browser("page has no document loaded".into()))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.shared.open.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(timeout_ms: u64) -> NavigationOptions {
        NavigationOptions {
            timeout: Duration::from_millis(timeout_ms),
            settle: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_navigation_times_out() {
        let browser = MemoryBrowser::new()
            .with_page("https://example.test/slow", StaticPage::ok("<p>slow</p>"))
            .with_latency(Duration::from_millis(200));

        let mut page = browser.new_page().await.unwrap();
        let err = page.goto("https://example.test/slow", &options(20)).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        page.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_counters_track_open_pages() {
        let browser = MemoryBrowser::new();
        let a = browser.new_page().await.unwrap();
        let b = browser.new_page().await.unwrap();
        assert_eq!(browser.open_pages(), 2);

        a.close().await.unwrap();
        b.close().await.unwrap();
        assert_eq!(browser.open_pages(), 0);
        assert_eq!(browser.max_open_pages(), 2);
        assert_eq!(browser.pages_opened(), 2);
    }

    #[tokio::test]
    async fn test_closed_browser_refuses_pages() {
        let mut browser = MemoryBrowser::new();
        browser.close().await.unwrap();
        assert!(browser.is_closed());
        assert!(browser.new_page().await.is_err());
    }
}
