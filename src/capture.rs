//! Container Capture
//!
//! Picks the HTML handed to extraction once collection is over. Container
//! selectors are the most fragile markup in the system, so a container that
//! holds implausibly few items is replaced by a wrapper rebuilt from the
//! individually enumerated elements.

use crate::browser::FeedPage;
use tracing::{debug, info, warn};

/// Most specific structural match first, generic role/label matches last.
pub const CONTAINER_SELECTORS: &[&str] = &[
    "div.css-175oi2r.r-f8sm7e.r-13qz1uu.r-1ye8kvj",
    r#"div[data-testid="primaryColumn"] div[data-testid="timeline"]"#,
    r#"div[role="feed"]"#,
    r#"div[aria-label*="Timeline"]"#,
];

const MIN_CONTAINER_BYTES: usize = 50;
const ITEM_TAG: &str = "<article";
const MIN_ITEM_TAGS: usize = 10;
const WRAPPER_OPEN: &str = "<div id='x-scraper-wrapper'>";
const WRAPPER_CLOSE: &str = "</div>";

/// True when the container holds fewer than max(10, elements/4) item tags.
pub fn container_too_sparse(html: &str, element_count: usize) -> bool {
    element_count > 0 && html.matches(ITEM_TAG).count() < MIN_ITEM_TAGS.max(element_count / 4)
}

pub fn wrap_items<I>(parts: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut lines = vec![WRAPPER_OPEN.to_string()];
    lines.extend(parts);
    lines.push(WRAPPER_CLOSE.to_string());
    lines.join("\n")
}

async fn first_container<P>(page: &P) -> Option<String>
where
    P: FeedPage + ?Sized,
{
    for selector in CONTAINER_SELECTORS {
        match page.container_html(selector).await {
            Ok(Some(html)) if html.len() > MIN_CONTAINER_BYTES => {
                info!(selector, "Captured container");
                return Some(html);
            }
            Ok(_) => debug!(selector, "Container missing or too small"),
            Err(e) => debug!(selector, error = %e, "Container lookup failed"),
        }
    }
    None
}

/// One HTML blob with every currently rendered item, or `None` when there is
/// neither a container nor any enumerable element.
pub async fn capture<P>(page: &P) -> Option<String>
where
    P: FeedPage + ?Sized,
{
    let container = first_container(page).await;

    let elements = match page.items().await {
        Ok(elements) => elements,
        Err(e) => {
            warn!(error = %e, "Item enumeration failed during capture");
            Vec::new()
        }
    };

    let needs_rebuild = match &container {
        None => !elements.is_empty(),
        Some(html) => container_too_sparse(html, elements.len()),
    };

    if !needs_rebuild {
        if container.is_none() {
            warn!("No HTML captured");
        }
        return container;
    }

    warn!(elements = elements.len(), "Fallback: concatenating item elements into wrapper");
    let mut parts = Vec::with_capacity(elements.len());
    for element in &elements {
        match page.outer_html(element).await {
            Ok(html) => parts.push(html),
            Err(e) => debug!(error = %e, "Skipping unreadable element"),
        }
    }
    Some(wrap_items(parts))
}
