use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScraperError {
    pub fn navigation(url: impl Into<String>, message: impl ToString) -> Self {
        ScraperError::Navigation {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
