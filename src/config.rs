//! Run configuration
//!
//! Loaded from `tracking/scraper.yml` under the project root. Every field has
//! a default so a missing file still yields a runnable configuration.

use crate::collector::{CollectorSettings, DEFAULT_STALL_LIMIT};
use crate::error::{Result, ScraperError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    pub hashtags: Vec<String>,
    pub per_tag_target: usize,
    pub max_rounds: usize,
    pub scroll_pause_ms: u64,
    pub element_wait_secs: u64,
    pub stall_limit: usize,
    pub headless: bool,
    pub webdriver_url: String,
    pub chromedriver_path: Option<PathBuf>,
    pub chrome_binary: Option<PathBuf>,
    pub site_url: String,
    pub output_dir: PathBuf,
    pub output_name: String,
    pub log_dir: PathBuf,
    /// Mask engagement counters and relative times before hashing fallback fingerprints.
    pub normalize_volatile_counts: bool,
    /// Pause between hashtags.
    pub hashtag_pause_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            hashtags: Vec::new(),
            per_tag_target: 500,
            max_rounds: 300,
            scroll_pause_ms: 800,
            element_wait_secs: 18,
            stall_limit: DEFAULT_STALL_LIMIT,
            headless: false,
            webdriver_url: "http://localhost:9515".to_string(),
            chromedriver_path: None,
            chrome_binary: None,
            site_url: "https://x.com".to_string(),
            output_dir: PathBuf::from("io"),
            output_name: "tweets.parquet".to_string(),
            log_dir: PathBuf::from("logs"),
            normalize_volatile_counts: false,
            hashtag_pause_ms: 1000,
        }
    }
}

impl RunConfig {
    pub fn collector_settings(&self) -> CollectorSettings {
        CollectorSettings {
            min_count: self.per_tag_target,
            max_rounds: self.max_rounds,
            pause: Duration::from_millis(self.scroll_pause_ms),
            stall_limit: self.stall_limit,
            normalize_volatile: self.normalize_volatile_counts,
        }
    }

    /// Configuration errors, all fatal. Call before starting the browser.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.hashtags.iter().all(|h| h.trim().is_empty()) {
            problems.push("no hashtags configured".to_string());
        }
        if self.per_tag_target == 0 {
            problems.push("per_tag_target must be at least 1".to_string());
        }
        if self.max_rounds == 0 {
            problems.push("max_rounds must be at least 1".to_string());
        }
        if self.stall_limit == 0 {
            problems.push("stall_limit must be at least 1".to_string());
        }
        if self.output_name.trim().is_empty() {
            problems.push("output_name is empty".to_string());
        }
        if let Some(path) = &self.chromedriver_path {
            if !path.exists() {
                problems.push(format!("Chromedriver not found at: {}", path.display()));
            }
        }
        if let Some(path) = &self.chrome_binary {
            if !path.exists() {
                problems.push(format!("Chrome binary not found at: {}", path.display()));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ScraperError::Config(problems.join("; ")))
        }
    }

    /// Non-fatal oddities worth reporting.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for tag in self.search_terms() {
            if !tag.starts_with('#') {
                warnings.push(format!("'{}' has no leading '#', it will be searched as a keyword", tag));
            }
        }
        if self.per_tag_target > self.max_rounds.saturating_mul(50) {
            warnings.push(format!(
                "per_tag_target {} is unlikely to be reached within {} rounds",
                self.per_tag_target, self.max_rounds
            ));
        }
        warnings
    }

    /// Hashtags trimmed, blanks and repeats removed, order kept.
    pub fn search_terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        for tag in &self.hashtags {
            let tag = tag.trim();
            if !tag.is_empty() && !terms.iter().any(|t| t == tag) {
                terms.push(tag.to_string());
            }
        }
        terms
    }
}
