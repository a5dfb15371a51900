//! Fingerprint Resolver
//!
//! Derives an identity string for one rendered feed element:
//! 1. the post id from a `/status/<digits>` path anywhere in its markup
//! 2. the post id from a descendant permalink `href`
//! 3. `sha256-<hex>` over the full markup
//!
//! Ids survive re-renders of recycled list nodes; the hash only guarantees
//! progress is measurable for markup shapes nobody recognised.

use crate::browser::FeedPage;
use crate::error::Result;
use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::debug;

pub const HASH_PREFIX: &str = "sha256-";

lazy_static! {
    static ref PERMALINK_RE: Regex = Regex::new(r"/status/(\d+)").unwrap();
    static ref COUNT_TEXT_RE: Regex = Regex::new(r">\s*[\d.,]+\s*[KkMm]?\s*<").unwrap();
    static ref LABEL_DIGITS_RE: Regex = Regex::new(r#"aria-label="[^"]*\d[^"]*""#).unwrap();
    static ref TIME_TEXT_RE: Regex = Regex::new(r"(<time[^>]*>)[^<]*(</time>)").unwrap();
}

/// Post id from the first `/status/<digits>` occurrence in `text`.
pub fn status_id(text: &str) -> Option<String> {
    PERMALINK_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn id_from_links(hrefs: &[String]) -> Option<String> {
    hrefs.iter().find_map(|href| status_id(href))
}

/// Fallback fingerprint. With `normalize_volatile` the engagement counters,
/// numeric aria-labels and relative time texts are masked first, so a live
/// like-count update does not produce a "new" item.
pub fn hash_fingerprint(html: &str, normalize_volatile: bool) -> String {
    let mut hasher = Sha256::new();
    if normalize_volatile {
        hasher.update(mask_volatile(html).as_bytes());
    } else {
        hasher.update(html.as_bytes());
    }
    format!("{}{:x}", HASH_PREFIX, hasher.finalize())
}

pub fn is_hash_fingerprint(fingerprint: &str) -> bool {
    fingerprint.starts_with(HASH_PREFIX)
}

fn mask_volatile(html: &str) -> String {
    let masked = COUNT_TEXT_RE.replace_all(html, "><");
    let masked = LABEL_DIGITS_RE.replace_all(&masked, r##"aria-label="#""##);
    TIME_TEXT_RE.replace_all(&masked, "$1$2").into_owned()
}

/// Fingerprint one element. Fails only when its markup cannot be read at
/// all; the caller skips such elements.
pub async fn resolve<P>(page: &P, element: &P::Element, normalize_volatile: bool) -> Result<String>
where
    P: FeedPage + ?Sized,
{
    let outer_html = page.outer_html(element).await?;

    if let Some(id) = status_id(&outer_html) {
        return Ok(id);
    }

    match page.permalink_hrefs(element).await {
        Ok(hrefs) => {
            if let Some(id) = id_from_links(&hrefs) {
                return Ok(id);
            }
        }
        Err(e) => debug!(error = %e, "Permalink lookup failed, hashing markup"),
    }

    Ok(hash_fingerprint(&outer_html, normalize_volatile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScraperError;
    use async_trait::async_trait;

    struct StaticPage;

    #[async_trait]
    impl FeedPage for StaticPage {
        type Element = (String, Vec<String>);

        async fn items(&self) -> Result<Vec<Self::Element>> {
            Ok(vec![])
        }
        async fn outer_html(&self, element: &Self::Element) -> Result<String> {
            if element.0 == "<broken>" {
                return Err(ScraperError::Driver("stale element".to_string()));
            }
            Ok(element.0.clone())
        }
        async fn permalink_hrefs(&self, element: &Self::Element) -> Result<Vec<String>> {
            Ok(element.1.clone())
        }
        async fn scroll_into_view(&self, _element: &Self::Element) -> Result<()> {
            Ok(())
        }
        async fn scroll_to_bottom(&self) -> Result<()> {
            Ok(())
        }
        async fn container_html(&self, _selector: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    #[test]
    fn test_status_id_ignores_markup_noise() {
        let html = r#"<article><div class="r-1"><a href="/jack/status/1789012345678?s=20">3h</a>
            <span>1.2K</span></div></article>"#;
        assert_eq!(status_id(html), Some("1789012345678".to_string()));
        assert_eq!(status_id("<div>/status/abc</div>"), None);
    }

    #[test]
    fn test_hash_fallback_is_deterministic() {
        let a = hash_fingerprint("<div>hello</div>", false);
        let b = hash_fingerprint("<div>hello</div>", false);
        let c = hash_fingerprint("<div>hello!</div>", false);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(is_hash_fingerprint(&a));
        assert_eq!(a.len(), HASH_PREFIX.len() + 64);
    }

    #[test]
    fn test_normalized_hash_ignores_counter_updates() {
        let before = r#"<div><time datetime="2024-01-01T00:00:00Z">2m</time><span aria-label="4 Likes. Like">4</span><p>gm</p></div>"#;
        let after = r#"<div><time datetime="2024-01-01T00:00:00Z">3m</time><span aria-label="5 Likes. Like">5</span><p>gm</p></div>"#;
        assert_ne!(hash_fingerprint(before, false), hash_fingerprint(after, false));
        assert_eq!(hash_fingerprint(before, true), hash_fingerprint(after, true));
        assert_ne!(
            hash_fingerprint(before, true),
            hash_fingerprint(&before.replace("gm", "gn"), true)
        );
    }

    #[tokio::test]
    async fn test_resolve_priority() {
        let page = StaticPage;

        let in_markup = (r#"<a href="/a/status/111">x</a>"#.to_string(), vec!["/b/status/222".to_string()]);
        assert_eq!(resolve(&page, &in_markup, false).await.unwrap(), "111");

        let in_links = ("<div>no link here</div>".to_string(), vec!["https://x.com/b/status/222".to_string()]);
        assert_eq!(resolve(&page, &in_links, false).await.unwrap(), "222");

        let hashed = ("<div>no link here</div>".to_string(), vec![]);
        let fingerprint = resolve(&page, &hashed, false).await.unwrap();
        assert!(is_hash_fingerprint(&fingerprint));

        let broken = ("<broken>".to_string(), vec![]);
        assert!(resolve(&page, &broken, false).await.is_err());
    }
}
