//! Record Extractor
//!
//! Turns captured feed HTML into [`ItemRecord`]s. Markup here changes
//! often, so every field is read through an ordered list of strategies;
//! the first one that applies wins and a field nobody can read stays `None`.
//! Nothing in this module fails on malformed input.

use crate::fingerprint;
use crate::numeric::{parse_count_from_text, shorthand_to_int};
use crate::types::ItemRecord;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub const ITEM_SELECTOR: &str = r#"[data-testid="tweet"]"#;
const CONTENT_SELECTOR: &str = r#"[data-testid="tweetText"]"#;
const USER_BLOCK_SELECTOR: &str = r#"[data-testid="User-Name"]"#;
const ACTION_GROUP_SELECTOR: &str = r#"div[role="group"]"#;
const HASHTAG_ROUTE: &str = "/hashtag";

lazy_static! {
    static ref BARE_PATH_RE: Regex = Regex::new(r"^/[^/]+$").unwrap();
    static ref VIEW_LABEL_RE: Regex = Regex::new(r"(?i)\bviews?\b").unwrap();
    static ref VIEWS_RE: Regex = Regex::new(r"(?i)([\d,.]+\s*[kKmM]?)\s*views?\b").unwrap();
}

/// Reads one field from an item block; `None` means "not applicable here".
type Strategy<T> = for<'a> fn(ElementRef<'a>) -> Option<T>;

/// Finds item blocks in a document; an empty result hands over to the next locator.
type BlockLocator = for<'a> fn(&'a Html) -> Vec<ElementRef<'a>>;

const BLOCK_LOCATORS: &[BlockLocator] = &[blocks_by_testid, blocks_by_structure];
const HANDLE_STRATEGIES: &[Strategy<String>] = &[handle_from_user_block, handle_from_profile_link];
const DISPLAY_NAME_STRATEGIES: &[Strategy<String>] = &[display_name_from_user_block];
const VIEW_STRATEGIES: &[Strategy<u64>] = &[views_from_label, views_from_text];

const REPLY_IDS: &[&str] = &["reply"];
const RETWEET_IDS: &[&str] = &["retweet", "unretweet"];
const LIKE_IDS: &[&str] = &["like", "unlike"];

/// Parse captured HTML into records, one per item block.
pub fn extract(html: &str) -> Vec<ItemRecord> {
    let document = Html::parse_document(html);
    let blocks = locate_blocks(&document);

    let records: Vec<ItemRecord> = blocks.into_iter().map(extract_item).collect();
    info!(records = records.len(), "Parsed records");
    records
}

fn first_applicable<T>(block: ElementRef<'_>, strategies: &[Strategy<T>]) -> Option<T> {
    strategies.iter().find_map(|strategy| strategy(block))
}

fn locate_blocks(document: &Html) -> Vec<ElementRef<'_>> {
    for (tier, locator) in BLOCK_LOCATORS.iter().enumerate() {
        let blocks = locator(document);
        if !blocks.is_empty() {
            if tier > 0 {
                warn!(blocks = blocks.len(), "Item selector matched nothing, using structural fallback");
            }
            return blocks;
        }
    }
    debug!("No item blocks found");
    Vec::new()
}

fn blocks_by_testid(document: &Html) -> Vec<ElementRef<'_>> {
    match Selector::parse(ITEM_SELECTOR) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Innermost `div`s holding both a `time` element and a text-content block.
fn blocks_by_structure(document: &Html) -> Vec<ElementRef<'_>> {
    let Ok(divs) = Selector::parse("div") else {
        return Vec::new();
    };

    let candidates: Vec<ElementRef<'_>> = document
        .select(&divs)
        .filter(|div| select_first(*div, "time").is_some() && select_first(*div, CONTENT_SELECTOR).is_some())
        .collect();

    let ids: HashSet<_> = candidates.iter().map(|c| c.id()).collect();
    let mut enclosing = HashSet::new();
    for candidate in &candidates {
        enclosing.extend(candidate.ancestors().map(|a| a.id()).filter(|id| ids.contains(id)));
    }

    candidates
        .into_iter()
        .filter(|c| !enclosing.contains(&c.id()))
        .collect()
}

fn extract_item(block: ElementRef<'_>) -> ItemRecord {
    let handle = first_applicable(block, HANDLE_STRATEGIES);
    let display_name = first_applicable(block, DISPLAY_NAME_STRATEGIES);

    let time = select_first(block, "time");
    let timestamp_iso = time.and_then(|t| t.value().attr("datetime")).map(str::to_string);
    let timestamp_relative = time.and_then(|t| non_empty(stripped_text(t)));
    let item_id = time
        .and_then(permalink_ancestor)
        .and_then(fingerprint::status_id);

    let (content, hashtags, mentions) = match select_first(block, CONTENT_SELECTOR) {
        Some(content_block) => {
            let (hashtags, mentions) = classify_links(content_block);
            (spaced_text(content_block), hashtags, mentions)
        }
        None => (spaced_text(block), Vec::new(), Vec::new()),
    };

    ItemRecord {
        item_id,
        display_name,
        username: handle.clone(),
        handle,
        timestamp_iso,
        timestamp_relative,
        content,
        hashtags,
        mentions,
        reply_count: engagement_count(block, REPLY_IDS),
        retweet_count: engagement_count(block, RETWEET_IDS),
        like_count: engagement_count(block, LIKE_IDS),
        view_count: first_applicable(block, VIEW_STRATEGIES),
        queried_hashtag: String::new(),
    }
}

fn select_first<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    scope.select(&selector).next()
}

/// Text nodes trimmed and glued together ("Jack" from `<span> Jack </span>`).
fn stripped_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

/// Visible text with all whitespace runs collapsed to single spaces.
fn spaced_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

fn permalink_ancestor<'a>(element: ElementRef<'a>) -> Option<&'a str> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "a" && a.value().attr("href").is_some())
        .and_then(|a| a.value().attr("href"))
}

fn handle_from_href(href: &str) -> Option<String> {
    href.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

fn handle_from_user_block(block: ElementRef<'_>) -> Option<String> {
    let link = select_first(select_first(block, USER_BLOCK_SELECTOR)?, "a")?;
    handle_from_href(link.value().attr("href")?)
}

fn handle_from_profile_link(block: ElementRef<'_>) -> Option<String> {
    let selector = Selector::parse("a[href]").ok()?;
    block
        .select(&selector)
        .filter(|a| !inside_content(*a))
        .filter_map(|a| a.value().attr("href"))
        .find(|href| BARE_PATH_RE.is_match(href) && !href.starts_with(HASHTAG_ROUTE))
        .and_then(handle_from_href)
}

/// Links in the text block are mentions, never the author.
fn inside_content(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().attr("data-testid") == Some("tweetText"))
}

fn display_name_from_user_block(block: ElementRef<'_>) -> Option<String> {
    let link = select_first(select_first(block, USER_BLOCK_SELECTOR)?, "a")?;
    non_empty(stripped_text(select_first(link, "span")?))
}

/// Hashtags and mentions linked from the content block, first-seen order, no repeats.
fn classify_links(content: ElementRef<'_>) -> (Vec<String>, Vec<String>) {
    let mut hashtags = Vec::new();
    let mut mentions = Vec::new();

    let Ok(links) = Selector::parse("a[href]") else {
        return (hashtags, mentions);
    };

    for link in content.select(&links) {
        let href = link.value().attr("href").unwrap_or_default();
        let text = stripped_text(link);

        if href.starts_with("/hashtag/") || text.starts_with('#') {
            push_unique(&mut hashtags, text);
        } else if text.starts_with('@') {
            push_unique(&mut mentions, text);
        } else if BARE_PATH_RE.is_match(href) && !href.starts_with(HASHTAG_ROUTE) {
            push_unique(&mut mentions, format!("@{}", href.trim_start_matches('/')));
        }
    }

    (hashtags, mentions)
}

/// Count shown on an action button, found by its `data-testid` inside the action group.
fn engagement_count(block: ElementRef<'_>, test_ids: &[&str]) -> Option<u64> {
    let group = select_first(block, ACTION_GROUP_SELECTOR)?;
    test_ids.iter().find_map(|id| {
        let button = select_first(group, &format!(r#"[data-testid="{}"]"#, id))?;
        parse_count_from_text(&spaced_text(button))
    })
}

fn views_from_label(block: ElementRef<'_>) -> Option<u64> {
    let selector = Selector::parse("[aria-label]").ok()?;
    block.select(&selector).find_map(|element| {
        let label = element.value().attr("aria-label")?;
        if !VIEW_LABEL_RE.is_match(label) {
            return None;
        }
        count_before_views(label).or_else(|| parse_count_from_text(&spaced_text(element)))
    })
}

fn views_from_text(block: ElementRef<'_>) -> Option<u64> {
    count_before_views(&spaced_text(block))
}

fn count_before_views(text: &str) -> Option<u64> {
    VIEWS_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| shorthand_to_int(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_ITEM: &str = r#"
        <article data-testid="tweet">
          <div data-testid="User-Name">
            <a href="/rustlang" role="link"><div><span> Rust Language </span></div></a>
            <a href="/rustlang/status/1790000000000000001"><time datetime="2024-05-13T10:00:00.000Z">2h</time></a>
          </div>
          <div data-testid="tweetText">
            <span>Release day</span>
            <a href="/hashtag/rust?src=hashtag_click">#rust</a>
            <a href="/hashtag/rust?src=hashtag_click">#rust</a>
            <span>thanks</span>
            <a href="/ferris">@ferris</a>
            <a href="/ferris">@ferris</a>
            <a href="/crabbo">crabbo</a>
            <a href="https://t.co/abc">blog.rust-lang.org</a>
          </div>
          <div role="group" aria-label="12 replies, 1.2K reposts, 3M likes">
            <button data-testid="reply"><span>12</span></button>
            <button data-testid="retweet"><span>1.2K</span></button>
            <button data-testid="like"><span>3M</span></button>
            <a href="/rustlang/status/1790000000000000001/analytics" aria-label="45,678 views. View post analytics"><span>45K</span></a>
          </div>
        </article>
    "#;

    #[test]
    fn test_full_item() {
        let records = extract(FULL_ITEM);
        assert_eq!(records.len(), 1);
        let r = &records[0];

        assert_eq!(r.item_id.as_deref(), Some("1790000000000000001"));
        assert_eq!(r.handle.as_deref(), Some("rustlang"));
        assert_eq!(r.username, r.handle);
        assert_eq!(r.display_name.as_deref(), Some("Rust Language"));
        assert_eq!(r.timestamp_iso.as_deref(), Some("2024-05-13T10:00:00.000Z"));
        assert_eq!(r.timestamp_relative.as_deref(), Some("2h"));
        assert!(r.content.starts_with("Release day #rust #rust thanks"));
        assert_eq!(r.reply_count, Some(12));
        assert_eq!(r.retweet_count, Some(1200));
        assert_eq!(r.like_count, Some(3_000_000));
        assert_eq!(r.view_count, Some(45_678));
        assert!(r.queried_hashtag.is_empty());
    }

    #[test]
    fn test_hashtags_and_mentions_unique_in_order() {
        let r = &extract(FULL_ITEM)[0];
        assert_eq!(r.hashtags, vec!["#rust".to_string()]);
        assert_eq!(r.mentions, vec!["@ferris".to_string(), "@crabbo".to_string()]);
    }

    #[test]
    fn test_missing_view_count_leaves_others_intact() {
        let html = r#"
            <article data-testid="tweet">
              <div data-testid="tweetText">no views here</div>
              <div role="group">
                <div data-testid="reply">4</div>
                <div data-testid="unretweet">2</div>
                <div data-testid="like">1.5K</div>
              </div>
            </article>
        "#;
        let r = &extract(html)[0];
        assert_eq!(r.view_count, None);
        assert_eq!(r.reply_count, Some(4));
        assert_eq!(r.retweet_count, Some(2));
        assert_eq!(r.like_count, Some(1500));
        assert_eq!(r.item_id, None);
        assert_eq!(r.handle, None);
    }

    #[test]
    fn test_view_count_from_text_when_no_label() {
        let html = r#"
            <article data-testid="tweet">
              <div data-testid="tweetText">hello</div>
              <span>2.4K views</span>
            </article>
        "#;
        assert_eq!(extract(html)[0].view_count, Some(2400));
    }

    #[test]
    fn test_structural_fallback_finds_innermost_blocks() {
        let html = r#"
            <div id="feed">
              <div class="cell">
                <a href="/alice"><span>Alice</span></a>
                <a href="/alice/status/11"><time datetime="2024-01-01T00:00:00Z">1m</time></a>
                <div data-testid="tweetText">first</div>
              </div>
              <div class="cell">
                <a href="/bob/status/22"><time datetime="2024-01-01T00:01:00Z">2m</time></a>
                <div data-testid="tweetText">second</div>
              </div>
            </div>
        "#;
        let records = extract(html);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].item_id.as_deref(), Some("11"));
        assert_eq!(records[0].handle.as_deref(), Some("alice"));
        assert_eq!(records[0].content, "first");
        assert_eq!(records[1].item_id.as_deref(), Some("22"));
    }

    #[test]
    fn test_structural_fallback_on_deep_nesting() {
        let mut html = String::new();
        for i in 0..40 {
            let mut post = format!(
                r#"<div><a href="/u/status/{i}"><time datetime="2024-01-01T00:00:00Z">1m</time></a><div data-testid="tweetText">post {i}</div></div>"#
            );
            for _ in 0..8 {
                post = format!("<div>{post}</div>");
            }
            html.push_str(&post);
        }
        let records = extract(&format!("<div>{html}</div>"));
        assert_eq!(records.len(), 40);
        assert_eq!(records[39].item_id.as_deref(), Some("39"));
        assert_eq!(records[39].content, "post 39");
    }

    #[test]
    fn test_profile_link_fallback_skips_mentions() {
        let html = r#"
            <article data-testid="tweet">
              <div data-testid="tweetText">hi <a href="/ferris">@ferris</a></div>
            </article>
        "#;
        let r = &extract(html)[0];
        assert_eq!(r.handle, None);
        assert_eq!(r.mentions, vec!["@ferris".to_string()]);

        let html = r#"
            <article data-testid="tweet">
              <div data-testid="tweetText">hi <a href="/ferris">@ferris</a></div>
              <a href="/alice">Alice</a>
            </article>
        "#;
        assert_eq!(extract(html)[0].handle.as_deref(), Some("alice"));
    }

    #[test]
    fn test_degraded_content_uses_full_text() {
        let html = r#"<article data-testid="tweet"><p>just   some
            text</p><span>here</span></article>"#;
        let r = &extract(html)[0];
        assert_eq!(r.content, "just some text here");
        assert!(r.hashtags.is_empty());
        assert_eq!(r.reply_count, None);
    }

    #[test]
    fn test_malformed_html_never_panics() {
        assert!(extract("").is_empty());
        assert!(extract("<div><<<>>").is_empty());
        let records = extract(r#"<article data-testid="tweet"><time>"#);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "");
        assert_eq!(records[0].timestamp_iso, None);
        assert_eq!(records[0].timestamp_relative, None);
    }
}
