//! Turns rendered search-result and event pages into structured records.
//!
//! Everything here is a pure function over HTML text so it can be exercised
//! without a browser.

use crate::browser::RenderedPage;
use crate::constants::{
    CARD_DETAILS_SELECTOR, CATEGORY_ATTR, DISPLAY_DATE_FORMAT, EXPIRED_EVENT_SELECTOR, HOME_REGION,
    HOME_UTC_OFFSET_SECS, LOCATION_SELECTOR, MAP_TOGGLE_SELECTOR, NEXT_PAGE_SELECTOR,
    ORGANIZER_SELECTOR, PAID_STATUS_ATTR, PRICE_WRAPPER_CLASS, RESULTS_LIST_CLASS_PREFIX,
    RESULTS_LIST_SELECTOR, START_DATE_SELECTOR,
};
use crate::types::{ListingDetail, ListingSummary};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e:?}"))
}

static RESULTS_LIST: Lazy<Selector> = Lazy::new(|| selector(RESULTS_LIST_SELECTOR));
static LIST_ITEM: Lazy<Selector> = Lazy::new(|| selector("li"));
static CARD_DETAILS: Lazy<Selector> = Lazy::new(|| selector(CARD_DETAILS_SELECTOR));
static ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a"));
static DIV: Lazy<Selector> = Lazy::new(|| selector("div"));
static NEXT_PAGE: Lazy<Selector> = Lazy::new(|| selector(NEXT_PAGE_SELECTOR));
static EXPIRED_EVENT: Lazy<Selector> = Lazy::new(|| selector(EXPIRED_EVENT_SELECTOR));
static ORGANIZER: Lazy<Selector> = Lazy::new(|| selector(ORGANIZER_SELECTOR));
static START_DATE: Lazy<Selector> = Lazy::new(|| selector(START_DATE_SELECTOR));
static LOCATION: Lazy<Selector> = Lazy::new(|| selector(LOCATION_SELECTOR));
static MAP_TOGGLE: Lazy<Selector> = Lazy::new(|| selector(MAP_TOGGLE_SELECTOR));

// Digits with optional thousands separators and decimals, e.g. "1,250.00"
static PRICE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d[\d,]*(?:\.\d+)?").unwrap_or_else(|e| panic!("invalid price pattern: {e}"))
});

// Time followed by an hours-only offset, e.g. "T10:00:00+08"
static HOURS_ONLY_OFFSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"T[\d:.]+[+-]\d{2}$").unwrap_or_else(|e| panic!("invalid offset pattern: {e}"))
});

/// Extract every event card of a search-results page.
///
/// Cards without a details section or without an anchor are skipped. A page
/// without the card-list container yields no listings.
pub fn extract_listings(html: &str, page_url: &str) -> Vec<ListingSummary> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    let Some(card_list) = document.select(&RESULTS_LIST).find(|ul| {
        ul.value()
            .attr("class")
            .is_some_and(|class| class.starts_with(RESULTS_LIST_CLASS_PREFIX))
    }) else {
        debug!(url = %page_url, "No card list container found");
        return Vec::new();
    };

    card_list
        .select(&LIST_ITEM)
        .filter_map(|card| extract_card(card, base.as_ref()))
        .collect()
}

fn extract_card(card: ElementRef<'_>, base: Option<&Url>) -> Option<ListingSummary> {
    let details = card.select(&CARD_DETAILS).next()?;
    let anchor = details.select(&ANCHOR).next()?;

    let title = element_text(anchor).trim().to_string();
    let url = anchor
        .value()
        .attr("href")
        .map(|href| absolute_url(href, base))
        .unwrap_or_default();

    let price = details
        .select(&DIV)
        .find(|div| {
            div.value()
                .attr("class")
                .is_some_and(|class| class.contains(PRICE_WRAPPER_CLASS))
        })
        .and_then(|div| parse_price(element_text(div).trim()));

    Some(ListingSummary {
        title,
        url,
        category: non_empty_attr(anchor, CATEGORY_ATTR),
        listing_type: non_empty_attr(anchor, PAID_STATUS_ATTR),
        price,
    })
}

/// Whether the pagination footer still offers a "next page" button
pub fn has_next_page(html: &str) -> bool {
    Html::parse_document(html).select(&NEXT_PAGE).next().is_some()
}

/// First numeric token of a price label, thousands separators removed.
pub fn parse_price(text: &str) -> Option<f64> {
    let token = PRICE_TOKEN.find(text)?;
    token.as_str().replace(',', "").parse::<f64>().ok()
}

/// Read the detail fields of an event page.
///
/// Returns `None` when the page is a 404, shows the "event already happened"
/// button, or carries a start date that is already behind `now`.
pub fn extract_detail(page: &RenderedPage, now: DateTime<Utc>) -> Option<ListingDetail> {
    if page.status == 404 {
        debug!(url = %page.url, "Event page not found");
        return None;
    }

    let document = Html::parse_document(&page.html);
    if document.select(&EXPIRED_EVENT).next().is_some() {
        debug!(url = %page.url, "Event page marked as expired");
        return None;
    }

    let organizer = document
        .select(&ORGANIZER)
        .next()
        .and_then(|el| non_empty(element_text(el)));

    let raw_date = document
        .select(&START_DATE)
        .next()
        .and_then(|el| el.value().attr("datetime"))
        .and_then(|value| non_empty(value.to_string()));

    let location = document
        .select(&LOCATION)
        .next()
        .and_then(|el| non_empty(text_without_map_toggle(el)))
        .map(|loc| normalize_location(&loc));

    let date = match raw_date {
        Some(raw) => match normalize_date(&raw, now) {
            EventDate::Upcoming(display) => Some(display),
            EventDate::Past => {
                debug!(url = %page.url, date = %raw, "Event date already passed");
                return None;
            }
            EventDate::Unparseable => {
                debug!(url = %page.url, date = %raw, "Unrecognised event date");
                None
            }
        },
        None => None,
    };

    Some(ListingDetail {
        organizer,
        location,
        date,
    })
}

/// Outcome of interpreting a detail page's raw `datetime` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDate {
    /// Formatted as `dd-MM-yyyy`
    Upcoming(String),
    Past,
    Unparseable,
}

pub fn normalize_date(raw: &str, now: DateTime<Utc>) -> EventDate {
    match parse_event_datetime(raw) {
        Some(start) if start.with_timezone(&Utc) < now => EventDate::Past,
        Some(start) => EventDate::Upcoming(start.format(DISPLAY_DATE_FORMAT).to_string()),
        None => EventDate::Unparseable,
    }
}

/// Parse an ISO-8601 style timestamp. Values without an offset are taken to
/// be in the home region's local time.
pub fn parse_event_datetime(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed);
    }

    // ISO basic offsets: "+0800", and "+08" widened to "+0800"
    let widened = if HOURS_ONLY_OFFSET.is_match(raw) {
        format!("{raw}00")
    } else {
        raw.to_string()
    };
    if let Some(parsed) = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%z"]
        .iter()
        .find_map(|format| DateTime::parse_from_str(&widened, format).ok())
    {
        return Some(parsed);
    }

    let home = FixedOffset::east_opt(HOME_UTC_OFFSET_SECS)?;
    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|day| day.and_hms_opt(0, 0, 0))
        })?;
    home.from_local_datetime(&naive).single()
}

/// Collapse any address mentioning the home region to the region's short name.
pub fn normalize_location(location: &str) -> String {
    if location.to_lowercase().contains(&HOME_REGION.to_lowercase()) {
        HOME_REGION.to_string()
    } else {
        location.to_string()
    }
}

fn absolute_url(href: &str, base: Option<&Url>) -> String {
    match base.map(|base| base.join(href)) {
        Some(Ok(joined)) => joined.to_string(),
        _ => href.to_string(),
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

// Text of the location block minus the "show map" control nested inside it
fn text_without_map_toggle(location: ElementRef<'_>) -> String {
    let toggles: Vec<_> = location.select(&MAP_TOGGLE).map(|el| el.id()).collect();

    let mut text = String::new();
    for node in location.descendants() {
        let Some(chunk) = node.value().as_text() else {
            continue;
        };
        if node.ancestors().any(|ancestor| toggles.contains(&ancestor.id())) {
            continue;
        }
        text.push_str(chunk);
    }
    text
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn non_empty_attr(element: ElementRef<'_>, attr: &str) -> Option<String> {
    element
        .value()
        .attr(attr)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
