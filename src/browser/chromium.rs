//! Headless Chromium driven over CDP with chromiumoxide.

use super::{Browser, BrowserPage, NavigationOptions, NavigationResponse};
use crate::config::BrowserConfig;
use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::page::Page;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

const RESPONSE_STATUS_SCRIPT: &str = r#"(() => {
    const nav = performance.getEntriesByType('navigation')[0];
    return nav && nav.responseStatus ? nav.responseStatus : 200;
})()"#;

/// Locate a Chromium binary: explicit path first, then the usual names on PATH.
/// `None` leaves detection to chromiumoxide.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        warn!(path = %path.display(), "Configured Chromium path does not exist");
    }

    ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"]
        .iter()
        .find_map(|name| which::which(name).ok())
}

pub struct ChromiumBrowser {
    browser: CdpBrowser,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    #[instrument(skip(config), fields(headless = config.headless))]
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let mut builder = CdpBrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");

        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = find_chromium(config.chrome_path.as_deref()) {
            debug!(path = %path.display(), "Using Chromium binary");
            builder = builder.chrome_executable(path);
        }

        let cdp_config = builder
            .build()
            .map_err(|e| ScraperError::Browser(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = CdpBrowser::launch(cdp_config)
            .await
            .map_err(|e| ScraperError::Browser(format!("failed to launch Chromium: {e}")))?;

        // The CDP connection only makes progress while its handler is polled
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler event error");
                }
            }
        });

        info!("Launched Chromium");
        Ok(Self { browser, handler })
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::Browser(format!("failed to open page: {e}")))?;
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(&mut self) -> Result<()> {
        let closed = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| ScraperError::Browser(format!("failed to close Chromium: {e}")));
        if let Err(e) = self.browser.wait().await {
            debug!(error = %e, "Chromium process did not exit cleanly");
        }
        self.handler.abort();
        info!("Closed Chromium");
        closed
    }
}

/// Request lifecycle as reported by the CDP network domain, keyed by request id
#[derive(Debug, Clone, PartialEq, Eq)]
enum NetworkActivity {
    Started(String),
    Settled(String),
}

fn track(in_flight: &mut HashSet<String>, activity: NetworkActivity) {
    match activity {
        // Redirects reuse the request id, so a repeated start is one request
        NetworkActivity::Started(id) => {
            in_flight.insert(id);
        }
        NetworkActivity::Settled(id) => {
            in_flight.remove(&id);
        }
    }
}

/// Resolve once no request has been in flight for a full `settle` window.
///
/// Any network event restarts the window. A closed event stream means the
/// page is gone and ends the wait.
async fn wait_for_network_idle<S>(mut events: S, settle: Duration)
where
    S: Stream<Item = NetworkActivity> + Unpin,
{
    let mut in_flight = HashSet::new();
    loop {
        let next = if in_flight.is_empty() {
            tokio::select! {
                _ = tokio::time::sleep(settle) => return,
                event = events.next() => event,
            }
        } else {
            events.next().await
        };

        match next {
            Some(activity) => track(&mut in_flight, activity),
            None => return,
        }
    }
}

struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    /// Subscribe to request start/finish/failure before navigating so the
    /// document request itself is counted.
    async fn network_activity(&self, url: &str) -> Result<BoxStream<'static, NetworkActivity>> {
        let started = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| ScraperError::navigation(url, e))?
            .map(|event| NetworkActivity::Started(event.request_id.inner().clone()));
        let finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(|e| ScraperError::navigation(url, e))?
            .map(|event| NetworkActivity::Settled(event.request_id.inner().clone()));
        let failed = self
            .page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(|e| ScraperError::navigation(url, e))?
            .map(|event| NetworkActivity::Settled(event.request_id.inner().clone()));

        Ok(stream::select_all([started.boxed(), finished.boxed(), failed.boxed()]).boxed())
    }

    async fn response_status(&self, url: &str) -> Result<u16> {
        self.page
            .evaluate(RESPONSE_STATUS_SCRIPT)
            .await
            .map_err(|e| ScraperError::navigation(url, e))?
            .into_value()
            .map_err(|e| ScraperError::navigation(url, e))
    }
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn goto(&mut self, url: &str, options: &NavigationOptions) -> Result<NavigationResponse> {
        let navigation = async {
            let activity = self.network_activity(url).await?;
            self.page
                .goto(url)
                .await
                .map_err(|e| ScraperError::navigation(url, e))?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|e| ScraperError::navigation(url, e))?;
            wait_for_network_idle(activity, options.settle).await;
            self.response_status(url).await
        };

        match tokio::time::timeout(options.timeout, navigation).await {
            Ok(status) => status.map(|status| NavigationResponse { status }),
            Err(_) => Err(ScraperError::navigation(
                url,
                format!("timed out after {}s", options.timeout.as_secs()),
            )),
        }
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| ScraperError::Extraction(format!("failed to read page content: {e}")))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.page
            .close()
            .await
            .map_err(|e| ScraperError::Browser(format!("failed to close page: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::load_page;
    use crate::config::ScrapeSettings;
    use futures::channel::mpsc;
    use std::time::Instant;

    fn started(id: &str) -> NetworkActivity {
        NetworkActivity::Started(id.to_string())
    }

    fn settled(id: &str) -> NetworkActivity {
        NetworkActivity::Settled(id.to_string())
    }

    #[tokio::test]
    async fn test_idle_network_settles_after_one_window() {
        let started_at = Instant::now();
        wait_for_network_idle(stream::pending::<NetworkActivity>(), Duration::from_millis(50)).await;
        assert!(started_at.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_pending_request_keeps_page_unsettled() {
        let (tx, rx) = mpsc::unbounded();
        tx.unbounded_send(started("document")).unwrap();
        tx.unbounded_send(settled("document")).unwrap();
        tx.unbounded_send(started("xhr")).unwrap();

        let outcome = tokio::time::timeout(
            Duration::from_millis(300),
            wait_for_network_idle(rx, Duration::from_millis(50)),
        )
        .await;

        assert!(outcome.is_err(), "settled while a request was still in flight");
        drop(tx);
    }

    #[tokio::test]
    async fn test_settle_window_starts_when_last_request_finishes() {
        let (tx, rx) = mpsc::unbounded();
        tx.unbounded_send(started("xhr")).unwrap();
        let sender = tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            sender.unbounded_send(settled("xhr")).unwrap();
        });

        let started_at = Instant::now();
        wait_for_network_idle(rx, Duration::from_millis(50)).await;

        assert!(started_at.elapsed() >= Duration::from_millis(150));
        drop(tx);
    }

    #[test]
    fn test_redirected_request_is_tracked_once() {
        let mut in_flight = HashSet::new();
        track(&mut in_flight, started("doc"));
        track(&mut in_flight, started("doc"));
        track(&mut in_flight, settled("doc"));
        assert!(in_flight.is_empty());

        track(&mut in_flight, settled("never-started"));
        assert!(in_flight.is_empty());
    }

    #[test]
    fn test_find_chromium_ignores_missing_explicit_path() {
        let found = find_chromium(Some(Path::new("/definitely/not/chrome")));
        assert_ne!(found.as_deref(), Some(Path::new("/definitely/not/chrome")));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_loads_data_url() {
        let mut browser = ChromiumBrowser::launch(&BrowserConfig::default())
            .await
            .expect("failed to launch Chromium");

        let page = load_page(
            &browser,
            "data:text/html,<h1>Hello</h1>",
            &ScrapeSettings::default(),
        )
        .await
        .expect("navigation failed");
        assert!(page.html.contains("<h1>Hello</h1>"));

        browser.close().await.expect("close failed");
    }
}
