//! Summary statistics and the Markdown report for one saved batch.

use crate::constants::{GENERATED_AT_FORMAT, HOME_REGION, SEARCH_CURRENCY};
use crate::error::Result;
use crate::extractor::normalize_location;
use crate::storage::ResultStore;
use crate::types::{format_price, EnrichedListing, ResultBatch};
use chrono::{Local, TimeZone};
use indexmap::{IndexMap, IndexSet};
use std::path::PathBuf;
use tracing::{info, instrument};

/// Occurrence counts keyed in first-seen order
pub type Counts = IndexMap<String, usize>;

const TOP_N: usize = 3;

#[derive(Debug, Clone)]
pub struct Statistics {
    pub batch_id: String,
    /// Run start time, `yyyy-MM-dd HH:mm:ss` local time
    pub generated_at: String,
    pub total: usize,
    pub locations: Vec<String>,
    pub type_counts: Counts,
    pub month_year_counts: Counts,
    pub category_counts: Counts,
    pub organizer_counts: Counts,
    /// `(title, price)` for every priced listing, most expensive first
    pub priced: Vec<(String, f64)>,
}

impl Statistics {
    pub fn from_batch(batch: &ResultBatch) -> Self {
        let listings = &batch.listings;

        let mut priced: Vec<(String, f64)> = listings
            .iter()
            .filter_map(|l| l.price.map(|price| (l.title.clone(), price)))
            .collect();
        priced.sort_by(|a, b| b.1.total_cmp(&a.1));

        Self {
            batch_id: batch.batch_id.clone(),
            generated_at: batch_timestamp(&batch.batch_id),
            total: listings.len(),
            locations: distinct_locations(listings),
            type_counts: count_by(listings, |l| l.listing_type.clone()),
            month_year_counts: count_by(listings, |l| l.date.as_deref().and_then(month_year_key)),
            category_counts: count_by(listings, |l| l.category.clone()),
            organizer_counts: count_by(listings, |l| l.organizer.clone()),
            priced,
        }
    }

    /// Earliest and latest `YYYY-MM` keys, if any listing had a date
    pub fn time_range(&self) -> Option<(&str, &str)> {
        let min = self.month_year_counts.keys().min()?;
        let max = self.month_year_counts.keys().max()?;
        Some((min.as_str(), max.as_str()))
    }

    pub fn type_count(&self, tag: &str) -> usize {
        self.type_counts.get(tag).copied().unwrap_or(0)
    }

    pub fn render_report(&self) -> String {
        let sections = [
            self.overview_section(),
            self.category_section(),
            self.price_section(),
            self.date_section(),
            self.organizer_section(),
        ];
        let mut report = sections.join("\n\n");
        report.push('\n');
        report
    }

    fn overview_section(&self) -> String {
        let (first_month, last_month) = self.time_range().unwrap_or(("N/A", "N/A"));
        let types: Vec<&str> = self.type_counts.keys().map(String::as_str).collect();

        format!(
            "# 📊 General Overview\n\n\
             > Source of report was generated on **{}**, which mean any changes happened after this date time will not be reflected in this report.\n\n\
             - Total Upcoming Events: {}\n\
             - Locations (full address will be shown if not in {}): {}\n\
             - Types: {}\n\
             - Time Range: {} to {}",
            self.generated_at,
            self.total,
            HOME_REGION,
            self.locations.join(", "),
            types.join(", "),
            first_month,
            last_month,
        )
    }

    fn category_section(&self) -> String {
        let ranked = ranked(&self.category_counts);
        let top = &ranked[..ranked.len().min(TOP_N)];
        let bottom = &ranked[ranked.len().saturating_sub(TOP_N)..];

        format!(
            "# 🧩 Category Distribution\n\nTop 3 categories:\n\n{}\n\nBottom 3 categories:\n\n{}",
            self.count_lines(top),
            self.count_lines(bottom),
        )
    }

    fn price_section(&self) -> String {
        let paid = self.type_count("paid");
        let free = self.type_count("free");
        let expensive: Vec<String> = self
            .priced
            .iter()
            .take(TOP_N)
            .map(|(title, price)| format!("- {} ({} {})", title, format_price(*price), SEARCH_CURRENCY))
            .collect();

        format!(
            "# 💵 Price Analysis\n\nTotal:\n\n\
             - Paid event: {} ({:.2}%)\n\
             - Free event: {} ({:.2}%)\n\n\
             Top 3 expensive event:\n\n{}",
            paid,
            percentage(paid, self.total),
            free,
            percentage(free, self.total),
            expensive.join("\n"),
        )
    }

    fn date_section(&self) -> String {
        let ranked = ranked(&self.month_year_counts);
        format!("# 📅 Date Distribution\n\n{}", self.count_lines(&ranked))
    }

    fn organizer_section(&self) -> String {
        let ranked = ranked(&self.organizer_counts);
        let top = &ranked[..ranked.len().min(TOP_N)];
        format!(
            "# 👥 Organizer Distribution:\n\nTop 3 Organizers:\n\n{}",
            self.count_lines(top)
        )
    }

    fn count_lines(&self, entries: &[(&str, usize)]) -> String {
        entries
            .iter()
            .map(|(key, count)| {
                format!("- {} ({} times/{:.2}%)", key, count, percentage(*count, self.total))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Load a saved batch, render its report and store it next to the results.
#[instrument(skip(store))]
pub fn analyse_batch(store: &ResultStore, batch_id: &str) -> Result<PathBuf> {
    let batch = store.load(batch_id)?;
    let report = Statistics::from_batch(&batch).render_report();
    let path = store.save_report(batch_id, &report)?;
    info!(folder = %batch_id, "Generated report for {} listings", batch.listings.len());
    Ok(path)
}

/// `count / total` as a percentage; an empty batch reports 0.
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64 * 100.0
}

/// `dd-MM-yyyy` → `yyyy-MM`
pub fn month_year_key(date: &str) -> Option<String> {
    let mut parts = date.split('-');
    let (_day, month, year) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || month.is_empty() || year.is_empty() {
        return None;
    }
    Some(format!("{year}-{month}"))
}

fn count_by<F>(listings: &[EnrichedListing], key: F) -> Counts
where
    F: Fn(&EnrichedListing) -> Option<String>,
{
    listings.iter().filter_map(key).fold(Counts::new(), |mut counts, value| {
        *counts.entry(value).or_insert(0) += 1;
        counts
    })
}

fn distinct_locations(listings: &[EnrichedListing]) -> Vec<String> {
    listings
        .iter()
        .filter_map(|l| l.location.as_deref())
        .filter(|loc| !loc.is_empty())
        .map(normalize_location)
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

// Highest count first; equal counts keep their first-seen order
fn ranked(counts: &Counts) -> Vec<(&str, usize)> {
    let mut entries: Vec<(&str, usize)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries
}

fn batch_timestamp(batch_id: &str) -> String {
    batch_id
        .parse::<i64>()
        .ok()
        .and_then(|millis| Local.timestamp_millis_opt(millis).single())
        .map(|at| at.format(GENERATED_AT_FORMAT).to_string())
        .unwrap_or_else(|| batch_id.to_string())
}
