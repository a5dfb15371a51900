//! Hashtag Harvester Library
//!
//! Collects posts from a hashtag's live feed through a driven browser,
//! extracts structured records from the captured HTML and writes one
//! Parquet dataset per run.

pub mod browser;
pub mod capture;
pub mod collector;
pub mod config;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod logging;
pub mod numeric;
pub mod orchestrator;
pub mod storage;
pub mod types;

pub use error::{Result, ScraperError};
pub use types::*;
