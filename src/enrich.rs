use crate::browser::{load_page, Browser};
use crate::config::ScrapeSettings;
use crate::extractor::extract_detail;
use crate::types::{EnrichedListing, ListingSummary};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use metrics::counter;
use tracing::{debug, error, info, instrument};

/// Visit every listing's own page and merge in its detail fields.
///
/// At most `settings.concurrency` pages are open at once. Listings whose page
/// fails to load, is gone, or describes a past event are dropped; the others
/// come back in completion order.
#[instrument(skip_all, fields(listings = listings.len(), concurrency = settings.concurrency))]
pub async fn enrich_listings(
    browser: &dyn Browser,
    listings: Vec<ListingSummary>,
    settings: &ScrapeSettings,
) -> Vec<EnrichedListing> {
    info!("Scraping event details");
    let total = listings.len();

    let enriched: Vec<EnrichedListing> = stream::iter(listings)
        .map(|listing| enrich_listing(browser, listing, settings))
        .buffer_unordered(settings.concurrency.max(1))
        .filter_map(|outcome| async move { outcome })
        .collect()
        .await;

    let dropped = total - enriched.len();
    counter!("event_scraper_details_enriched_total").increment(enriched.len() as u64);
    counter!("event_scraper_details_dropped_total").increment(dropped as u64);
    info!("Scraped event details: {} kept, {} dropped", enriched.len(), dropped);

    enriched
}

async fn enrich_listing(
    browser: &dyn Browser,
    listing: ListingSummary,
    settings: &ScrapeSettings,
) -> Option<EnrichedListing> {
    info!("Scraping {}", listing.url);

    let page = match load_page(browser, &listing.url, settings).await {
        Ok(page) => page,
        Err(e) => {
            error!(url = %listing.url, error = %e, "Failed to scrape event details");
            return None;
        }
    };

    match extract_detail(&page, Utc::now()) {
        Some(detail) => {
            info!("Scraped {}", listing.url);
            Some(EnrichedListing::merge(listing, detail))
        }
        None => {
            debug!(url = %listing.url, "Dropping expired or missing event");
            None
        }
    }
}
