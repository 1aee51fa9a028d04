use crate::browser::{Browser, ChromiumBrowser};
use crate::config::{Config, ScrapeSettings};
use crate::enrich::enrich_listings;
use crate::error::Result;
use crate::pagination::walk_search_results;
use crate::statistics::analyse_batch;
use crate::storage::{new_batch_id, ResultStore};
use crate::types::Period;
use chrono::Utc;
use metrics::{counter, histogram};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Result of one complete scrape run
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub period: Period,
    pub batch_id: String,
    pub listings_found: usize,
    pub listings_saved: usize,
    pub output_dir: PathBuf,
    /// `None` when the report could not be generated
    pub report_path: Option<PathBuf>,
}

pub struct Pipeline;

impl Pipeline {
    /// Launch Chromium and run one scrape for the configured period.
    pub async fn run(config: &Config) -> Result<PipelineResult> {
        let mut browser = ChromiumBrowser::launch(&config.browser).await?;
        let store = ResultStore::new(&config.output.results_dir);
        Self::run_with_browser(&mut browser, &store, config.scrape.period, &config.scrape_settings())
            .await
    }

    /// Walk, enrich, save and report, closing `browser` once scraping is done.
    ///
    /// Only a failure to persist the batch is returned as an error. Scrape
    /// failures shrink the batch and a report failure leaves `report_path` empty.
    #[instrument(skip(browser, store, period, settings), fields(period = %period))]
    pub async fn run_with_browser(
        browser: &mut dyn Browser,
        store: &ResultStore,
        period: Period,
        settings: &ScrapeSettings,
    ) -> Result<PipelineResult> {
        info!("Start scraping upcoming {} events", period);
        counter!("event_scraper_runs_total").increment(1);
        let started = Instant::now();
        let batch_id = new_batch_id(Utc::now());

        let listings = walk_search_results(&*browser, period, settings).await;
        let listings_found = listings.len();
        info!("Found {} listings", listings_found);

        let enriched = enrich_listings(&*browser, listings, settings).await;
        let saved = store.save(&batch_id, &enriched);

        if let Err(e) = browser.close().await {
            warn!(error = %e, "Failed to close browser");
        }
        saved?;
        info!("Scraped {} events", period);

        let report_path = match analyse_batch(store, &batch_id) {
            Ok(path) => Some(path),
            Err(e) => {
                error!(folder = %batch_id, error = %e, "Failed to generate report");
                None
            }
        };

        histogram!("event_scraper_run_duration_seconds").record(started.elapsed().as_secs_f64());

        Ok(PipelineResult {
            period,
            batch_id: batch_id.clone(),
            listings_found,
            listings_saved: enriched.len(),
            output_dir: store.batch_dir(&batch_id),
            report_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{MemoryBrowser, StaticPage};
    use crate::pagination::search_url;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_with_no_results_still_saves_batch_and_report() {
        let temp = TempDir::new().unwrap();
        let store = ResultStore::new(temp.path());
        let mut browser = MemoryBrowser::new().with_page(
            search_url(Period::Tomorrow, 1),
            StaticPage::ok("<html><body>No events</body></html>"),
        );

        let result = Pipeline::run_with_browser(
            &mut browser,
            &store,
            Period::Tomorrow,
            &ScrapeSettings::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.listings_found, 0);
        assert_eq!(result.listings_saved, 0);
        assert!(store.json_path(&result.batch_id).is_file());
        assert!(store.csv_path(&result.batch_id).is_file());
        assert_eq!(result.report_path, Some(store.report_path(&result.batch_id)));
        assert!(browser.is_closed());
    }

    #[tokio::test]
    async fn test_unwritable_store_fails_the_run_but_closes_browser() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("results");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = ResultStore::new(&blocker);
        let mut browser = MemoryBrowser::new();

        let outcome = Pipeline::run_with_browser(
            &mut browser,
            &store,
            Period::NextWeek,
            &ScrapeSettings::default(),
        )
        .await;

        assert!(outcome.is_err());
        assert!(browser.is_closed());
    }
}
