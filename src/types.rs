use crate::error::ScraperError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Search period tag understood by the results site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Period {
    Tomorrow,
    ThisWeekend,
    ThisWeek,
    NextWeek,
    ThisMonth,
    NextMonth,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Tomorrow => "tomorrow",
            Period::ThisWeekend => "this-weekend",
            Period::ThisWeek => "this-week",
            Period::NextWeek => "next-week",
            Period::ThisMonth => "this-month",
            Period::NextMonth => "next-month",
        }
    }

    pub fn all() -> [Period; 6] {
        [
            Period::Tomorrow,
            Period::ThisWeekend,
            Period::ThisWeek,
            Period::NextWeek,
            Period::ThisMonth,
            Period::NextMonth,
        ]
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::all()
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| ScraperError::Config(format!("unknown period '{s}'")))
    }
}

/// General listing information taken from a search-results card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSummary {
    pub title: String,
    pub url: String,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub listing_type: Option<String>,
    pub price: Option<f64>,
}

/// Fields only available on an event's own page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingDetail {
    pub organizer: Option<String>,
    pub location: Option<String>,
    /// `dd-MM-yyyy`
    pub date: Option<String>,
}

/// A listing merged with its detail page. This is the persisted record shape,
/// so field order here is also the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedListing {
    pub title: String,
    pub url: String,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub listing_type: Option<String>,
    pub price: Option<f64>,
    pub organizer: Option<String>,
    pub location: Option<String>,
    pub date: Option<String>,
}

impl EnrichedListing {
    pub fn merge(summary: ListingSummary, detail: ListingDetail) -> Self {
        Self {
            title: summary.title,
            url: summary.url,
            category: summary.category,
            listing_type: summary.listing_type,
            price: summary.price,
            organizer: detail.organizer,
            location: detail.location,
            date: detail.date,
        }
    }
}

/// All enriched listings of one run, keyed by the run's start timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct ResultBatch {
    pub batch_id: String,
    pub listings: Vec<EnrichedListing>,
}

/// Render a price the way listings show it: whole amounts without a
/// fractional part, so `1250.0` prints as `1250`.
pub fn format_price(price: f64) -> String {
    if price.fract() == 0.0 && price.abs() < 1e15 {
        format!("{price:.0}")
    } else {
        price.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_round_trips_through_tag() {
        for period in Period::all() {
            assert_eq!(period.as_str().parse::<Period>().unwrap(), period);
        }
        assert!("next-year".parse::<Period>().is_err());
    }

    #[test]
    fn test_listing_type_serializes_as_type() {
        let summary = ListingSummary {
            title: "Jazz Night".to_string(),
            url: "https://www.eventbrite.sg/e/jazz-night-1".to_string(),
            category: Some("music".to_string()),
            listing_type: Some("paid".to_string()),
            price: Some(25.0),
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["type"], "paid");
        assert!(value.get("listing_type").is_none());
    }

    #[test]
    fn test_merge_keeps_summary_and_detail_fields() {
        let summary = ListingSummary {
            title: "Jazz Night".to_string(),
            url: "https://www.eventbrite.sg/e/jazz-night-1".to_string(),
            category: None,
            listing_type: Some("free".to_string()),
            price: None,
        };
        let detail = ListingDetail {
            organizer: Some("Blue Note".to_string()),
            location: Some("Singapore".to_string()),
            date: Some("01-03-2030".to_string()),
        };

        let merged = EnrichedListing::merge(summary, detail);
        assert_eq!(merged.url, "https://www.eventbrite.sg/e/jazz-night-1");
        assert_eq!(merged.listing_type.as_deref(), Some("free"));
        assert_eq!(merged.organizer.as_deref(), Some("Blue Note"));
        assert_eq!(merged.date.as_deref(), Some("01-03-2030"));
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(120.0), "120");
        assert_eq!(format_price(1250.0), "1250");
        assert_eq!(format_price(12.5), "12.5");
    }
}
