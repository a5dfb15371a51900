//! Browser Driver seam
//!
//! The collector and capture steps only see [`FeedPage`]; the orchestrator
//! additionally drives navigation through [`FeedSession`]. The real
//! implementation is [`selenium::SeleniumSession`].

mod navigation;
pub mod selenium;

pub use selenium::SeleniumSession;

use crate::error::Result;
use crate::types::Credentials;
use async_trait::async_trait;
use std::time::Duration;

/// Read/scroll access to the rendered feed.
///
/// Every read may legitimately come back empty: rendering is asynchronous
/// and nothing here assumes an element exists yet.
#[async_trait]
pub trait FeedPage: Send + Sync {
    type Element: Send + Sync;

    /// All currently rendered content elements, in document order.
    async fn items(&self) -> Result<Vec<Self::Element>>;

    async fn outer_html(&self, element: &Self::Element) -> Result<String>;

    /// `href`s of descendant links that look like permalinks.
    async fn permalink_hrefs(&self, element: &Self::Element) -> Result<Vec<String>>;

    async fn scroll_into_view(&self, element: &Self::Element) -> Result<()>;

    async fn scroll_to_bottom(&self) -> Result<()>;

    /// Outer HTML of the first element matching `selector`, waiting a bounded time.
    async fn container_html(&self, selector: &str) -> Result<Option<String>>;

    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Navigation collaborators around the feed. All of them are best-effort.
#[async_trait]
pub trait FeedSession: FeedPage {
    async fn login(&self, credentials: &Credentials) -> Result<()>;

    /// Returns false when the explore/search surface could not be reached.
    async fn open_explore(&self) -> Result<bool>;

    async fn search(&self, query: &str) -> Result<()>;

    /// Returns false when the "Latest" tab was not found.
    async fn select_latest(&self) -> Result<bool>;

    /// Release the browser. Must be safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}
