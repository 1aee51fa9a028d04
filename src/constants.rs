//! Site and layout constants for the Eventbrite Singapore search pages.
//! The DOM selectors mirror the live card-list layout; a layout change on the
//! site means updating them here.

use crate::types::Period;

/// Period scraped by a plain `event_scraper` run unless `config.toml` overrides it.
pub const DEFAULT_PERIOD: Period = Period::NextMonth;

pub const SEARCH_URL_BASE: &str = "https://www.eventbrite.sg/d/singapore";
pub const SEARCH_CURRENCY: &str = "SGD";

// Home region used for location canonicalisation
pub const HOME_REGION: &str = "Singapore";
/// Offset of the home region from UTC, applied to naive detail-page datetimes.
pub const HOME_UTC_OFFSET_SECS: i32 = 8 * 3600;

pub const DETAIL_CONCURRENCY: usize = 5;
pub const NAVIGATION_TIMEOUT_SECS: u64 = 60;
/// Quiet window with no in-flight requests before a page counts as settled.
pub const NETWORK_SETTLE_MS: u64 = 500;
pub const MAX_SEARCH_PAGES: u32 = 100;
pub const DEV_SLOW_MO_MS: u64 = 250;

pub const RESULTS_DIR: &str = "results";
pub const RESULTS_FILE_STEM: &str = "results";
pub const REPORT_FILE: &str = "report.md";
pub const DISPLAY_DATE_FORMAT: &str = "%d-%m-%Y";
pub const GENERATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// List page
pub const RESULTS_LIST_SELECTOR: &str = "div.search-results-panel-content div section ul";
pub const RESULTS_LIST_CLASS_PREFIX: &str = "SearchResultPanelContentEventCardList";
pub const CARD_DETAILS_SELECTOR: &str = "section.event-card-details";
pub const PRICE_WRAPPER_CLASS: &str = "priceWrapper";
pub const CATEGORY_ATTR: &str = "data-event-category";
pub const PAID_STATUS_ATTR: &str = "data-event-paid-status";
pub const NEXT_PAGE_SELECTOR: &str =
    r#"div.search-results-panel-content div footer ul li[data-testid="page-next-wrapper"] > button"#;

// Detail page
pub const EXPIRED_EVENT_SELECTOR: &str = r#"button[data-testid="view-event-details-button"]"#;
pub const ORGANIZER_SELECTOR: &str =
    r#"div[data-testid="organizerBrief"] strong[class^="organizer-listing-info"]"#;
pub const START_DATE_SELECTOR: &str = "time.start-date";
pub const LOCATION_SELECTOR: &str = "div.location-info";
pub const MAP_TOGGLE_SELECTOR: &str = ".map-button-toggle";
