use anyhow::{Context, Result};
use clap::Parser;
use hashtag_harvester::browser::SeleniumSession;
use hashtag_harvester::logging::RunLogger;
use hashtag_harvester::orchestrator::Orchestrator;
use hashtag_harvester::{storage, Credentials};
use std::path::PathBuf;
use tracing::info;

/// Collect the latest posts for a set of hashtags into a dated Parquet file.
#[derive(Debug, Parser)]
#[command(name = "hashtag-harvester", version)]
struct Args {
    /// Config file; defaults to $ROOT/tracking/scraper.yml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hashtag to collect; repeat to collect several. Replaces the configured list.
    #[arg(long = "hashtag")]
    hashtags: Vec<String>,

    /// Unique items to load per hashtag
    #[arg(long)]
    target: Option<usize>,

    #[arg(long)]
    max_rounds: Option<usize>,

    #[arg(long)]
    headless: bool,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[arg(long, env = "X_USERNAME", hide_env_values = true)]
    username: Option<String>,

    #[arg(long, env = "X_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let root = std::env::var("ROOT").unwrap_or_else(|_| ".".to_string());

    let mut config = match &args.config {
        Some(path) => storage::load_config_from(path)?,
        None => storage::load_config(&root)?,
    };

    if !args.hashtags.is_empty() {
        config.hashtags = args.hashtags.clone();
    }
    if let Some(target) = args.target {
        config.per_tag_target = target;
    }
    if let Some(max_rounds) = args.max_rounds {
        config.max_rounds = max_rounds;
    }
    if args.headless {
        config.headless = true;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }

    config.validate().context("Invalid configuration")?;

    let logger = RunLogger::install(&config.log_dir);
    for warning in config.warnings() {
        tracing::warn!("{}", warning);
    }

    let credentials = Credentials::from_parts(args.username, args.password);
    let session = match SeleniumSession::start(&config).await {
        Ok(session) => session,
        Err(e) if e.is_fatal() => return Err(anyhow::Error::new(e).context("Invalid configuration")),
        Err(e) => return Err(anyhow::Error::new(e).context("Failed to start browser session")),
    };

    let mut orchestrator = Orchestrator::new(config, logger);
    let summary = orchestrator.run(session, credentials).await?;

    for outcome in &summary.hashtags {
        info!(
            hashtag = %outcome.hashtag,
            loaded = outcome.loaded,
            records = outcome.records,
            status = ?outcome.status,
            "Hashtag summary"
        );
    }
    if let Some(log_file) = orchestrator.log_file() {
        info!(path = %log_file.display(), "Run log");
    }

    println!("{}", summary.output_path.display());
    Ok(())
}
