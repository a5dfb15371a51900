//! Incremental Collector
//!
//! Bounded polling loop over a virtualized, asynchronously populated feed
//! that has no completion signal. Each round fingerprints what is rendered,
//! then scrolls and waits. Three exits: target reached, growth plateau,
//! round budget spent.

use crate::browser::FeedPage;
use crate::fingerprint;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_STALL_LIMIT: usize = 6;

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub min_count: usize,
    pub max_rounds: usize,
    pub pause: Duration,
    pub stall_limit: usize,
    pub normalize_volatile: bool,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            min_count: 500,
            max_rounds: 300,
            pause: Duration::from_millis(800),
            stall_limit: DEFAULT_STALL_LIMIT,
            normalize_volatile: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    TargetReached,
    Stalled,
    RoundBudgetExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    pub unique_count: usize,
    /// Rounds executed, counting the one that terminated.
    pub rounds: usize,
    pub termination: Termination,
}

/// Transient per-hashtag state; dropped once the hashtag's capture is done.
#[derive(Debug, Default)]
pub struct CollectionState {
    seen: HashSet<String>,
    stall_rounds: usize,
    round: usize,
    last_count: usize,
}

impl CollectionState {
    pub fn unique_count(&self) -> usize {
        self.seen.len()
    }

    /// Merge one round's fingerprints and update the stall counter.
    /// Returns the unique count after the merge.
    fn absorb(&mut self, fingerprints: impl IntoIterator<Item = String>) -> usize {
        self.seen.extend(fingerprints);
        let current = self.seen.len();
        if current <= self.last_count {
            self.stall_rounds += 1;
        } else {
            self.stall_rounds = 0;
        }
        self.last_count = current;
        current
    }

    fn report(&self, termination: Termination) -> CollectionReport {
        CollectionReport {
            unique_count: self.seen.len(),
            rounds: self.round,
            termination,
        }
    }
}

/// Scroll the feed until `min_count` unique items were seen, growth stalled
/// for `stall_limit` rounds, or `max_rounds` rounds ran.
pub async fn collect<P>(page: &P, settings: &CollectorSettings) -> CollectionReport
where
    P: FeedPage + ?Sized,
{
    info!(target = settings.min_count, max_rounds = settings.max_rounds, "Collecting unique items");
    let mut state = CollectionState::default();

    while state.round < settings.max_rounds {
        let elements = match page.items().await {
            Ok(elements) => elements,
            Err(e) => {
                debug!(error = %e, "Item enumeration failed, treating as empty");
                Vec::new()
            }
        };

        let mut fingerprints = Vec::with_capacity(elements.len());
        for element in &elements {
            match fingerprint::resolve(page, element, settings.normalize_volatile).await {
                Ok(fp) => fingerprints.push(fp),
                Err(e) => debug!(error = %e, "Skipping unreadable element"),
            }
        }

        let current = state.absorb(fingerprints);
        state.round += 1;
        debug!(round = state.round, max_rounds = settings.max_rounds, unique = current, "Round complete");

        if current >= settings.min_count {
            info!(unique = current, rounds = state.round, "Target reached");
            return state.report(Termination::TargetReached);
        }

        if state.stall_rounds >= settings.stall_limit {
            warn!(
                stall_rounds = state.stall_rounds,
                unique = current,
                "No progress, stopping"
            );
            return state.report(Termination::Stalled);
        }

        load_more(page, elements.last()).await;
        page.pause(settings.pause).await;
    }

    warn!(rounds = state.round, unique = state.unique_count(), "Round budget exhausted");
    state.report(Termination::RoundBudgetExhausted)
}

async fn load_more<P>(page: &P, last: Option<&P::Element>)
where
    P: FeedPage + ?Sized,
{
    if let Some(element) = last {
        match page.scroll_into_view(element).await {
            Ok(()) => return,
            Err(e) => debug!(error = %e, "Element scroll failed, scrolling window"),
        }
    }
    if let Err(e) = page.scroll_to_bottom().await {
        debug!(error = %e, "Window scroll failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ScraperError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Feed that reveals `per_round` new posts after every scroll, optionally
    /// drying up after `stop_after` scrolls, and only keeps `window` posts
    /// rendered at once.
    struct SimulatedFeed {
        per_round: usize,
        stop_after: Option<usize>,
        window: Option<usize>,
        scrolls: Mutex<usize>,
        bottom_scrolls: Mutex<usize>,
    }

    impl SimulatedFeed {
        fn new(per_round: usize) -> Self {
            Self {
                per_round,
                stop_after: None,
                window: None,
                scrolls: Mutex::new(0),
                bottom_scrolls: Mutex::new(0),
            }
        }

        fn scrolls(&self) -> usize {
            *self.scrolls.lock().unwrap()
        }

        fn visible(&self) -> usize {
            let scrolls = self.scrolls();
            let rounds = match self.stop_after {
                Some(k) => scrolls.min(k),
                None => scrolls,
            };
            self.per_round * (rounds + 1)
        }
    }

    #[async_trait]
    impl FeedPage for SimulatedFeed {
        type Element = usize;

        async fn items(&self) -> Result<Vec<usize>> {
            let total = self.visible();
            let start = self.window.map_or(0, |w| total.saturating_sub(w));
            Ok((start..total).collect())
        }
        async fn outer_html(&self, element: &usize) -> Result<String> {
            if *element == 3 {
                return Err(ScraperError::Driver("stale element reference".to_string()));
            }
            Ok(format!(r#"<article><a href="/user/status/{}">1h</a></article>"#, 1000 + element))
        }
        async fn permalink_hrefs(&self, _element: &usize) -> Result<Vec<String>> {
            Ok(vec![])
        }
        async fn scroll_into_view(&self, _element: &usize) -> Result<()> {
            *self.scrolls.lock().unwrap() += 1;
            Ok(())
        }
        async fn scroll_to_bottom(&self) -> Result<()> {
            *self.bottom_scrolls.lock().unwrap() += 1;
            *self.scrolls.lock().unwrap() += 1;
            Ok(())
        }
        async fn container_html(&self, _selector: &str) -> Result<Option<String>> {
            Ok(None)
        }
        async fn pause(&self, _duration: Duration) {}
    }

    fn settings(min_count: usize, max_rounds: usize) -> CollectorSettings {
        CollectorSettings {
            min_count,
            max_rounds,
            pause: Duration::ZERO,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_stops_at_first_round_reaching_target() {
        let feed = SimulatedFeed::new(10);
        let report = collect(&feed, &settings(50, 100)).await;

        // element 3 always fails, so 10 per round minus one skipped element
        assert_eq!(report.termination, Termination::TargetReached);
        assert_eq!(report.rounds, 6);
        assert_eq!(report.unique_count, 59);
    }

    #[tokio::test]
    async fn test_never_exceeds_round_budget() {
        let feed = SimulatedFeed::new(10);
        let report = collect(&feed, &settings(10_000, 7)).await;

        assert_eq!(report.termination, Termination::RoundBudgetExhausted);
        assert_eq!(report.rounds, 7);
        assert_eq!(feed.scrolls(), 7);
    }

    #[tokio::test]
    async fn test_stall_rule_stops_six_rounds_after_plateau() {
        let mut feed = SimulatedFeed::new(5);
        feed.stop_after = Some(3);
        let report = collect(&feed, &settings(10_000, 300)).await;

        // growth in rounds 1..=4, six flat rounds after that
        assert_eq!(report.termination, Termination::Stalled);
        assert_eq!(report.rounds, 4 + DEFAULT_STALL_LIMIT);
        assert_eq!(report.unique_count, 19);
    }

    #[tokio::test]
    async fn test_recycled_window_still_accumulates() {
        let mut feed = SimulatedFeed::new(8);
        feed.window = Some(10);
        let report = collect(&feed, &settings(40, 100)).await;

        assert_eq!(report.termination, Termination::TargetReached);
        assert!(report.unique_count >= 40);
    }

    #[tokio::test]
    async fn test_empty_feed_scrolls_window_and_stalls() {
        let feed = SimulatedFeed::new(0);
        let report = collect(&feed, &settings(1, 300)).await;

        assert_eq!(report.termination, Termination::Stalled);
        assert_eq!(report.unique_count, 0);
        assert_eq!(*feed.bottom_scrolls.lock().unwrap(), DEFAULT_STALL_LIMIT - 1);
    }
}
