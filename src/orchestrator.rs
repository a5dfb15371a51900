//! Session Orchestrator
//!
//! Sequences one run: optional login, then for each hashtag navigate, search,
//! pick the latest ordering, collect, capture and extract. Batches are merged
//! with an id-based dedupe and written once. The session is owned here for
//! the whole run and closed on every exit path.

use crate::browser::FeedSession;
use crate::capture;
use crate::collector::{self, CollectorSettings};
use crate::config::RunConfig;
use crate::extract;
use crate::logging::RunLogger;
use crate::storage;
use crate::types::{Credentials, HashtagOutcome, HashtagStatus, ItemRecord, RunSummary};
use anyhow::Context;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    DriverStarted,
    Authenticated,
    Guest,
    Navigated,
    Searched,
    LatestSelected,
    Collected,
    Captured,
    Extracted,
    Aggregated,
    Persisted,
    Closed,
}

pub struct Orchestrator {
    config: RunConfig,
    logger: RunLogger,
    state: RunState,
    history: Vec<RunState>,
}

impl Orchestrator {
    pub fn new(config: RunConfig, logger: RunLogger) -> Self {
        Self {
            config,
            logger,
            state: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.logger.log_file()
    }

    fn transition(&mut self, next: RunState) {
        info!(from = ?self.state, to = ?next, "State transition");
        self.state = next;
        self.history.push(next);
    }

    /// Run every configured hashtag through `session` and persist the result.
    /// The session is closed before returning, whether the run succeeded or not.
    pub async fn run<S>(&mut self, mut session: S, credentials: Option<Credentials>) -> anyhow::Result<RunSummary>
    where
        S: FeedSession,
    {
        self.transition(RunState::DriverStarted);

        let result = self.drive(&session, credentials.as_ref()).await;
        if let Err(e) = &result {
            error!(error = %e, "Run failed");
        }

        if let Err(e) = session.close().await {
            warn!(error = %e, "Browser close reported an error");
        }
        self.transition(RunState::Closed);

        result
    }

    async fn drive<S>(&mut self, session: &S, credentials: Option<&Credentials>) -> anyhow::Result<RunSummary>
    where
        S: FeedSession,
    {
        match credentials {
            Some(credentials) => {
                if let Err(e) = session.login(credentials).await {
                    warn!(error = %e, "Login failed, continuing without it");
                }
                self.transition(RunState::Authenticated);
            }
            None => {
                info!("No credentials supplied, running as guest");
                self.transition(RunState::Guest);
            }
        }

        let settings = self.config.collector_settings();
        let hashtag_pause = Duration::from_millis(self.config.hashtag_pause_ms);

        let mut outcomes = Vec::new();
        let mut batches = Vec::new();
        for (index, hashtag) in self.config.search_terms().into_iter().enumerate() {
            if index > 0 {
                session.pause(hashtag_pause).await;
            }
            let (outcome, records) = self.harvest(session, &hashtag, &settings).await;
            outcomes.push(outcome);
            batches.push(records);
        }

        let records = aggregate(batches);
        self.transition(RunState::Aggregated);
        info!(total = records.len(), "Aggregated hashtag batches");

        let output_path = storage::todays_output_path(&self.config.output_dir, &self.config.output_name);
        storage::persist(&records, &output_path)
            .with_context(|| format!("Failed to persist dataset to {}", output_path.display()))?;
        self.transition(RunState::Persisted);

        Ok(RunSummary {
            output_path,
            total_records: records.len(),
            hashtags: outcomes,
        })
    }

    async fn harvest<S>(
        &mut self,
        session: &S,
        hashtag: &str,
        settings: &CollectorSettings,
    ) -> (HashtagOutcome, Vec<ItemRecord>)
    where
        S: FeedSession,
    {
        info!(hashtag, "Processing hashtag");

        match session.open_explore().await {
            Ok(true) => {}
            Ok(false) => warn!(hashtag, "Explore page not confirmed, searching anyway"),
            Err(e) => warn!(hashtag, error = %e, "Explore navigation failed, searching anyway"),
        }
        self.transition(RunState::Navigated);

        if let Err(e) = session.search(hashtag).await {
            error!(hashtag, error = %e, "Search failed, skipping hashtag");
            let outcome = HashtagOutcome {
                hashtag: hashtag.to_string(),
                loaded: 0,
                records: 0,
                status: HashtagStatus::SearchFailed(e.to_string()),
            };
            return (outcome, Vec::new());
        }
        self.transition(RunState::Searched);

        match session.select_latest().await {
            Ok(true) => self.transition(RunState::LatestSelected),
            Ok(false) => warn!(hashtag, "Latest tab not found, keeping current ordering"),
            Err(e) => warn!(hashtag, error = %e, "Latest tab selection failed, keeping current ordering"),
        }

        let report = collector::collect(session, settings).await;
        self.transition(RunState::Collected);
        info!(
            hashtag,
            loaded = report.unique_count,
            rounds = report.rounds,
            termination = ?report.termination,
            "Collection finished"
        );

        let Some(html) = capture::capture(session).await else {
            warn!(hashtag, "No HTML captured, skipping hashtag");
            let outcome = HashtagOutcome {
                hashtag: hashtag.to_string(),
                loaded: report.unique_count,
                records: 0,
                status: HashtagStatus::NoHtml,
            };
            return (outcome, Vec::new());
        };
        self.transition(RunState::Captured);

        let mut records = extract::extract(&html);
        for record in &mut records {
            record.queried_hashtag = hashtag.to_string();
        }
        self.transition(RunState::Extracted);
        info!(hashtag, records = records.len(), "Extracted records");

        let outcome = HashtagOutcome {
            hashtag: hashtag.to_string(),
            loaded: report.unique_count,
            records: records.len(),
            status: HashtagStatus::Extracted,
        };
        (outcome, records)
    }
}

/// Concatenate batches in order, dropping later records whose `item_id` was
/// already seen. Records without an id are always kept.
pub fn aggregate(batches: Vec<Vec<ItemRecord>>) -> Vec<ItemRecord> {
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|record| match &record.item_id {
            Some(id) => seen.insert(id.clone()),
            None => true,
        })
        .collect()
}
