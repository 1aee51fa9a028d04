use crate::constants::{REPORT_FILE, RESULTS_DIR, RESULTS_FILE_STEM};
use crate::error::{Result, ScraperError};
use crate::types::{format_price, EnrichedListing, ResultBatch};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Batch ids are the run's start time in epoch milliseconds, so directory
/// names sort chronologically.
pub fn new_batch_id(started_at: DateTime<Utc>) -> String {
    started_at.timestamp_millis().to_string()
}

/// File-backed store laid out as `<root>/<batch_id>/{results.json,results.csv,report.md}`
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new(RESULTS_DIR)
    }
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn batch_dir(&self, batch_id: &str) -> PathBuf {
        self.root.join(batch_id)
    }

    pub fn json_path(&self, batch_id: &str) -> PathBuf {
        self.batch_dir(batch_id).join(format!("{RESULTS_FILE_STEM}.json"))
    }

    pub fn csv_path(&self, batch_id: &str) -> PathBuf {
        self.batch_dir(batch_id).join(format!("{RESULTS_FILE_STEM}.csv"))
    }

    pub fn report_path(&self, batch_id: &str) -> PathBuf {
        self.batch_dir(batch_id).join(REPORT_FILE)
    }

    fn ensure_batch_dir(&self, batch_id: &str) -> Result<PathBuf> {
        let dir = self.batch_dir(batch_id);
        if !dir.exists() {
            info!("Creating result directory {}", dir.display());
            fs::create_dir_all(&dir)?;
        }
        Ok(dir)
    }

    /// Write the listings as JSON and CSV into the batch directory.
    #[instrument(skip(self, listings), fields(count = listings.len()))]
    pub fn save(&self, batch_id: &str, listings: &[EnrichedListing]) -> Result<()> {
        self.ensure_batch_dir(batch_id)?;
        info!(folder = %batch_id, "Saving result");

        let json_content = serde_json::to_string_pretty(listings)?;
        fs::write(self.json_path(batch_id), json_content)?;

        fs::write(self.csv_path(batch_id), to_csv(listings)?)?;

        info!(folder = %batch_id, "Saved result");
        Ok(())
    }

    #[instrument(skip(self, text))]
    pub fn save_report(&self, batch_id: &str, text: &str) -> Result<PathBuf> {
        self.ensure_batch_dir(batch_id)?;
        let path = self.report_path(batch_id);
        fs::write(&path, text)?;
        info!(folder = %batch_id, "Saved report");
        Ok(path)
    }

    /// Read a saved batch back from its JSON file.
    pub fn load(&self, batch_id: &str) -> Result<ResultBatch> {
        let path = self.json_path(batch_id);
        if !path.is_file() {
            return Err(ScraperError::NotFound(format!(
                "no saved results at {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(&path)?;
        let listings: Vec<EnrichedListing> =
            serde_json::from_str(&content).map_err(|e| ScraperError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        debug!(folder = %batch_id, count = listings.len(), "Loaded result batch");

        Ok(ResultBatch {
            batch_id: batch_id.to_string(),
            listings,
        })
    }
}

// Header row is written even when there are no rows
fn to_csv(listings: &[EnrichedListing]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for listing in listings {
        let price = listing.price.map(format_price).unwrap_or_default();
        writer.write_record([
            listing.title.as_str(),
            listing.url.as_str(),
            text_or_empty(&listing.category),
            text_or_empty(&listing.listing_type),
            price.as_str(),
            text_or_empty(&listing.organizer),
            text_or_empty(&listing.location),
            text_or_empty(&listing.date),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| ScraperError::Io(e.into_error()))
}

fn text_or_empty(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

const CSV_HEADER: [&str; 8] = [
    "title",
    "url",
    "category",
    "type",
    "price",
    "organizer",
    "location",
    "date",
];
