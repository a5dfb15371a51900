use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One collected post.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ItemRecord {
    /// Platform id taken from a `/status/<digits>` permalink.
    pub item_id: Option<String>,
    pub display_name: Option<String>,
    pub handle: Option<String>,
    /// Mirrors `handle` for now.
    pub username: Option<String>,
    pub timestamp_iso: Option<String>,
    pub timestamp_relative: Option<String>,
    /// Never null; empty when nothing could be read.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
    pub reply_count: Option<u64>,
    pub retweet_count: Option<u64>,
    pub like_count: Option<u64>,
    pub view_count: Option<u64>,
    /// Search term that produced this record. Set by the orchestrator.
    #[serde(rename = "_queried_hashtag", default)]
    pub queried_hashtag: String,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Both values must be present and non-blank, otherwise the run is a guest run.
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Option<Self> {
        match (username, password) {
            (Some(u), Some(p)) if !u.trim().is_empty() && !p.trim().is_empty() => Some(Self {
                username: u,
                password: p,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HashtagStatus {
    Extracted,
    NoHtml,
    SearchFailed(String),
}

/// Per-hashtag result reported by the orchestrator.
#[derive(Debug, Clone)]
pub struct HashtagOutcome {
    pub hashtag: String,
    pub loaded: usize,
    pub records: usize,
    pub status: HashtagStatus,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output_path: PathBuf,
    pub total_records: usize,
    pub hashtags: Vec<HashtagOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_require_both_parts() {
        assert!(Credentials::from_parts(Some("user".into()), Some("pw".into())).is_some());
        assert!(Credentials::from_parts(Some("user".into()), None).is_none());
        assert!(Credentials::from_parts(None, Some("pw".into())).is_none());
        assert!(Credentials::from_parts(Some("  ".into()), Some("pw".into())).is_none());
    }

    #[test]
    fn test_queried_hashtag_serializes_with_underscore() {
        let record = ItemRecord {
            queried_hashtag: "#rust".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["_queried_hashtag"], "#rust");
        assert_eq!(json["content"], "");
    }
}
