//! Self-describing output documents
//!
//! Every stage writes exactly one [`Feed`]: a schema tag, a metadata block
//! (generation time, status, count, per-reason rejection counts, the
//! thresholds that were applied), and the entry list. Downstream stages and
//! the health monitor always have something parseable to read, including
//! after a fatal run failure (see [`write_error_feed`]).

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::store::JsonStore;

/// Coarse run outcome recorded in the feed metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    /// Candidates were produced
    Ok,
    /// Source responded but nothing passed the gates
    Calm,
    /// Upstream failed or returned nothing; partial or empty results
    Degraded,
    /// The run itself failed; entries are empty
    Error,
}

impl Default for FeedStatus {
    fn default() -> Self {
        FeedStatus::Calm
    }
}

impl FeedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedStatus::Ok => "ok",
            FeedStatus::Calm => "calm",
            FeedStatus::Degraded => "degraded",
            FeedStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedMeta {
    pub generated_at: Option<DateTime<Utc>>,
    pub status: FeedStatus,
    pub count: usize,
    /// Rejection reason -> count; threshold rejection is an outcome, not an error
    #[serde(default)]
    pub rejected: BTreeMap<String, u32>,
    /// The policy the run applied, for audit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<serde_json::Value>,
    /// Truncated error description, only on status = error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Feed<T> {
    pub schema: String,
    pub meta: FeedMeta,
    pub entries: Vec<T>,
}

impl<T> Feed<T> {
    pub fn new(schema: &str, generated_at: DateTime<Utc>) -> Self {
        Self {
            schema: schema.to_string(),
            meta: FeedMeta {
                generated_at: Some(generated_at),
                ..FeedMeta::default()
            },
            entries: Vec::new(),
        }
    }

    /// Count a rejection under a stable reason key
    pub fn reject(&mut self, reason: &str) {
        *self.meta.rejected.entry(reason.to_string()).or_insert(0) += 1;
    }

    pub fn finalize(&mut self, status: FeedStatus, thresholds: Option<serde_json::Value>) {
        self.meta.status = status;
        self.meta.count = self.entries.len();
        self.meta.thresholds = thresholds;
    }
}

/// Cap on the error description carried in an error feed
const MAX_ERROR_LEN: usize = 500;

/// Write a minimal, well-formed error feed so downstream consumers never
/// find a missing or torn document after a crash.
pub fn write_error_feed(path: &Path, schema: &str, message: &str) {
    let mut truncated = message.to_string();
    truncated.truncate(MAX_ERROR_LEN);

    let feed: Feed<serde_json::Value> = Feed {
        schema: schema.to_string(),
        meta: FeedMeta {
            generated_at: Some(Utc::now()),
            status: FeedStatus::Error,
            count: 0,
            rejected: BTreeMap::new(),
            thresholds: None,
            error: Some(truncated),
        },
        entries: Vec::new(),
    };

    let store: JsonStore<Feed<serde_json::Value>> = JsonStore::new(path);
    if let Err(e) = store.save(&feed) {
        log::error!("[FEED] Failed to write error feed {}: {}", path.display(), e);
    }
}

/// Load a feed document, defaulting to an empty one when missing or malformed
pub fn load_feed<T: DeserializeOwned + Serialize + Default>(path: &Path) -> Feed<T>
where
    Feed<T>: Default,
{
    let store: JsonStore<Feed<T>> = JsonStore::new(path);
    store.load()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_counts_accumulate() {
        let mut feed: Feed<u32> = Feed::new("trawler_test_v1", Utc::now());
        feed.reject("too_old");
        feed.reject("too_old");
        feed.reject("low_liquidity");
        assert_eq!(feed.meta.rejected["too_old"], 2);
        assert_eq!(feed.meta.rejected["low_liquidity"], 1);
    }

    #[test]
    fn test_finalize_sets_count() {
        let mut feed: Feed<u32> = Feed::new("trawler_test_v1", Utc::now());
        feed.entries.extend([1, 2, 3]);
        feed.finalize(FeedStatus::Ok, None);
        assert_eq!(feed.meta.count, 3);
        assert_eq!(feed.meta.status, FeedStatus::Ok);
    }

    #[test]
    fn test_error_feed_is_parseable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.json");
        let long = "x".repeat(2000);
        write_error_feed(&path, "trawler_test_v1", &long);

        let feed: Feed<serde_json::Value> = load_feed(&path);
        assert_eq!(feed.schema, "trawler_test_v1");
        assert_eq!(feed.meta.status, FeedStatus::Error);
        assert_eq!(feed.meta.error.unwrap().len(), 500);
        assert!(feed.entries.is_empty());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let text = serde_json::to_string(&FeedStatus::Degraded).unwrap();
        assert_eq!(text, "\"degraded\"");
    }
}
