use crate::browser::{load_page, Browser};
use crate::config::ScrapeSettings;
use crate::constants::{SEARCH_CURRENCY, SEARCH_URL_BASE};
use crate::extractor::{extract_listings, has_next_page};
use crate::types::{ListingSummary, Period};
use metrics::counter;
use tracing::{error, info, instrument, warn};

/// Search-results URL for one page of a period
pub fn search_url(period: Period, page: u32) -> String {
    format!("{SEARCH_URL_BASE}/events--{period}/?page={page}&cur={SEARCH_CURRENCY}")
}

/// Walk the search results of `period` page by page until the site stops
/// offering a next page, collecting every listing card.
///
/// A page that fails to load ends the walk; whatever was collected up to
/// that point is returned. `settings.max_pages` caps the walk in case the
/// next-page control never disappears.
#[instrument(skip(browser, period, settings), fields(period = %period))]
pub async fn walk_search_results(
    browser: &dyn Browser,
    period: Period,
    settings: &ScrapeSettings,
) -> Vec<ListingSummary> {
    let mut listings = Vec::new();
    let mut page_number = 1;

    loop {
        let url = search_url(period, page_number);
        info!("Scraping {}", url);

        let page = match load_page(browser, &url, settings).await {
            Ok(page) => page,
            Err(e) => {
                error!(url = %url, error = %e, "Failed to scrape search results");
                break;
            }
        };

        let found = extract_listings(&page.html, &url);
        info!("Scraped {} ({} listings)", url, found.len());
        counter!("event_scraper_search_pages_total").increment(1);
        counter!("event_scraper_listings_found_total").increment(found.len() as u64);
        listings.extend(found);

        if !has_next_page(&page.html) {
            info!("End of search results");
            break;
        }
        if page_number >= settings.max_pages {
            warn!(max_pages = settings.max_pages, "Page limit reached, stopping pagination");
            break;
        }

        info!("Next page is available");
        page_number += 1;
    }

    listings
}
