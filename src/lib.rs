pub mod browser;
pub mod config;
pub mod constants;
pub mod enrich;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod pagination;
pub mod pipeline;
pub mod statistics;
pub mod storage;
pub mod types;
