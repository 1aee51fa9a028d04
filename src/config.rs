use crate::constants::{
    DEFAULT_PERIOD, DETAIL_CONCURRENCY, DEV_SLOW_MO_MS, MAX_SEARCH_PAGES, NAVIGATION_TIMEOUT_SECS,
    NETWORK_SETTLE_MS, RESULTS_DIR,
};
use crate::error::{Result, ScraperError};
use crate::types::Period;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const CONFIG_PATH: &str = "config.toml";

/// Runtime settings. Every key is optional; a missing `config.toml` means
/// the built-in constants are used as-is.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scrape: ScrapeConfig,
    pub browser: BrowserConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub period: Period,
    pub max_pages: u32,
    pub concurrency: usize,
    pub navigation_timeout_secs: u64,
    pub settle_ms: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            max_pages: MAX_SEARCH_PAGES,
            concurrency: DETAIL_CONCURRENCY,
            navigation_timeout_secs: NAVIGATION_TIMEOUT_SECS,
            settle_ms: NETWORK_SETTLE_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub slow_mo_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            slow_mo_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub results_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from(RESULTS_DIR),
        }
    }
}

/// Per-navigation knobs shared by the pagination walker and the enricher
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub navigation_timeout: Duration,
    pub settle: Duration,
    pub slow_mo: Duration,
    pub max_pages: u32,
    pub concurrency: usize,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Config::default().scrape_settings()
    }
}

impl Config {
    /// Load `config.toml` from the working directory, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(CONFIG_PATH)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// `SCRAPER_ENV=development` opens a visible, slowed-down browser;
    /// `CHROME_PATH` points at a specific Chromium binary.
    pub fn apply_env(&mut self) {
        if matches!(std::env::var("SCRAPER_ENV").as_deref(), Ok("development")) {
            self.browser.headless = false;
            if self.browser.slow_mo_ms == 0 {
                self.browser.slow_mo_ms = DEV_SLOW_MO_MS;
            }
        }
        if let Ok(path) = std::env::var("CHROME_PATH") {
            if !path.trim().is_empty() {
                self.browser.chrome_path = Some(PathBuf::from(path));
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.scrape.concurrency == 0 {
            return Err(ScraperError::Config("scrape.concurrency must be at least 1".into()));
        }
        if self.scrape.max_pages == 0 {
            return Err(ScraperError::Config("scrape.max_pages must be at least 1".into()));
        }
        if self.scrape.navigation_timeout_secs == 0 {
            return Err(ScraperError::Config(
                "scrape.navigation_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn scrape_settings(&self) -> ScrapeSettings {
        ScrapeSettings {
            navigation_timeout: Duration::from_secs(self.scrape.navigation_timeout_secs),
            settle: Duration::from_millis(self.scrape.settle_ms),
            slow_mo: Duration::from_millis(self.browser.slow_mo_ms),
            max_pages: self.scrape.max_pages,
            concurrency: self.scrape.concurrency,
        }
    }
}
