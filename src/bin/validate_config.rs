//! Config Validation Binary
//!
//! Validates tracking/scraper.yml without starting a browser:
//! - Reports errors that would abort a run
//! - Reports warnings about hashtags and limits

use anyhow::{Context, Result};
use hashtag_harvester::storage;

fn main() -> Result<()> {
    let root = std::env::var("ROOT").unwrap_or_else(|_| ".".to_string());

    println!("=== Scraper Configuration Validator ===");

    let config = storage::load_config(&root).context("Failed to load scraper.yml")?;

    let errors: Vec<String> = match config.validate() {
        Ok(()) => Vec::new(),
        Err(e) => vec![e.to_string()],
    };
    let warnings = config.warnings();

    if errors.is_empty() && warnings.is_empty() {
        println!("✓ Config is valid ({} hashtags)", config.search_terms().len());
        return Ok(());
    }

    if !errors.is_empty() {
        println!("\n❌ ERRORS (must fix):");
        for error in &errors {
            println!("  - {}", error);
        }
    }

    if !warnings.is_empty() {
        println!("\n⚠️  WARNINGS:");
        for warning in &warnings {
            println!("  - {}", warning);
        }
    }

    if !errors.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}
