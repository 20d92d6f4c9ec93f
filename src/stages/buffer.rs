//! Buffer stage: the silent re-check window
//!
//! Admits discovery candidates aged 10-30 minutes that clear fixed
//! liquidity/activity floors, and requires the same token to show up on
//! consecutive buffer runs before it counts as promotable. The re-check
//! counter lives in the watch registry; once a token has been checked more
//! than `max_checks` times it drops out of this feed (only this feed) no
//! matter how good its metrics look.

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::candidate::{Candidate, PipelineStatus};
use crate::config::Config;
use crate::feed::{Feed, FeedStatus};
use crate::paths;
use crate::registry::WatchRegistry;
use crate::store::JsonStore;

pub const BUFFER_SCHEMA: &str = "trawler_buffer_v1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BufferEntry {
    pub candidate: Candidate,
    /// Consecutive buffer runs that observed this token; more observations
    /// mean more confidence, so the feed ranks on it
    pub checks: u32,
}

pub fn run(config: &Config) -> anyhow::Result<Feed<BufferEntry>> {
    let discovery_path = paths::get_discovery_feed_path();
    let upstream: Feed<Candidate> = if discovery_path.exists() {
        JsonStore::new(&discovery_path).load()
    } else {
        Feed::default()
    };

    let watch_store: JsonStore<WatchRegistry> = JsonStore::new(paths::get_watch_registry_path());
    let mut watch = watch_store.load();

    let feed = evaluate(&upstream, &mut watch, config, Utc::now());

    watch_store.save(&watch)?;

    let feed_store: JsonStore<Feed<BufferEntry>> = JsonStore::new(paths::get_buffer_feed_path());
    feed_store.save(&feed)?;

    info!(
        "[BUFFER] {} watching, status {}, rejected {:?}",
        feed.meta.count,
        feed.meta.status.as_str(),
        feed.meta.rejected
    );

    Ok(feed)
}

pub fn evaluate(
    upstream: &Feed<Candidate>,
    watch: &mut WatchRegistry,
    config: &Config,
    now: DateTime<Utc>,
) -> Feed<BufferEntry> {
    let policy = &config.buffer;
    let mut feed: Feed<BufferEntry> = Feed::new(BUFFER_SCHEMA, now);

    if upstream.schema.is_empty() {
        feed.reject("no_discovery_feed");
        feed.finalize(FeedStatus::Degraded, serde_json::to_value(policy).ok());
        return feed;
    }

    for candidate in &upstream.entries {
        let age_minutes = candidate.age_minutes_at(now);

        if age_minutes < policy.min_age_minutes {
            feed.reject("too_young");
            continue;
        }
        if age_minutes > policy.max_age_minutes {
            feed.reject("too_old");
            continue;
        }
        if candidate.metrics.liquidity_usd < policy.min_liquidity_usd {
            feed.reject("low_liquidity");
            continue;
        }
        if candidate.metrics.txns_5m < policy.min_txns_5m {
            feed.reject("low_activity");
            continue;
        }

        let checks = watch.record_check(&candidate.token.address, now);
        if checks > policy.max_checks {
            feed.reject("max_checks_exceeded");
            continue;
        }

        let mut entry = BufferEntry {
            candidate: candidate.clone(),
            checks,
        };
        entry.candidate.status = PipelineStatus::Buffered;
        entry.candidate.age_minutes = age_minutes;
        feed.entries.push(entry);
    }

    watch.prune(now, policy.retention_hours);

    feed.entries.sort_by(|a, b| b.checks.cmp(&a.checks));
    feed.entries.truncate(policy.max_candidates);

    let status = if feed.entries.is_empty() {
        FeedStatus::Calm
    } else {
        FeedStatus::Ok
    };
    feed.finalize(status, serde_json::to_value(policy).ok());
    feed
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{CandidateMetrics, TokenIdentity};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn candidate(token: &str, age_minutes: i64, liquidity: f64, txns_5m: u32) -> Candidate {
        Candidate {
            token: TokenIdentity {
                address: token.to_string(),
                symbol: "EXM".to_string(),
                name: "Example".to_string(),
            },
            pool_address: format!("{token}-pool"),
            metrics: CandidateMetrics {
                liquidity_usd: liquidity,
                txns_5m,
                ..CandidateMetrics::default()
            },
            pair_created_at: Some(now() - chrono::Duration::minutes(age_minutes)),
            token_first_seen: now() - chrono::Duration::minutes(age_minutes),
            age_minutes: age_minutes as f64,
            ..Candidate::default()
        }
    }

    fn upstream(entries: Vec<Candidate>) -> Feed<Candidate> {
        let mut feed = Feed::new("trawler_discovery_v1", now());
        feed.entries = entries;
        feed.finalize(FeedStatus::Ok, None);
        feed
    }

    #[test]
    fn test_age_window_gates() {
        let config = Config::default();
        let mut watch = WatchRegistry::default();

        let feed = evaluate(
            &upstream(vec![
                candidate("0xyoung", 5, 10_000.0, 20),
                candidate("0xok", 15, 10_000.0, 20),
                candidate("0xold", 45, 10_000.0, 20),
            ]),
            &mut watch,
            &config,
            now(),
        );

        assert_eq!(feed.entries.len(), 1);
        assert_eq!(feed.entries[0].candidate.token.address, "0xok");
        assert_eq!(feed.meta.rejected["too_young"], 1);
        assert_eq!(feed.meta.rejected["too_old"], 1);
    }

    #[test]
    fn test_checks_accumulate_across_runs_and_cap() {
        let config = Config::default(); // max_checks = 3
        let mut watch = WatchRegistry::default();
        let entries = vec![candidate("0xtok", 15, 10_000.0, 20)];

        for expected in 1..=3u32 {
            let feed = evaluate(&upstream(entries.clone()), &mut watch, &config, now());
            assert_eq!(feed.entries.len(), 1);
            assert_eq!(feed.entries[0].checks, expected);
        }

        // fourth consecutive observation exceeds the cap and drops out
        let feed = evaluate(&upstream(entries), &mut watch, &config, now());
        assert!(feed.entries.is_empty());
        assert_eq!(feed.meta.rejected["max_checks_exceeded"], 1);
    }

    #[test]
    fn test_ranked_by_checks_descending() {
        let config = Config::default();
        let mut watch = WatchRegistry::default();

        // one token already observed twice
        watch.record_check("0xveteran", now());
        watch.record_check("0xveteran", now());

        let feed = evaluate(
            &upstream(vec![
                candidate("0xnewcomer", 15, 10_000.0, 20),
                candidate("0xveteran", 20, 10_000.0, 20),
            ]),
            &mut watch,
            &config,
            now(),
        );

        assert_eq!(feed.entries[0].candidate.token.address, "0xveteran");
        assert_eq!(feed.entries[0].checks, 3);
        assert_eq!(feed.entries[1].checks, 1);
    }

    #[test]
    fn test_floors_do_not_consume_a_check() {
        let config = Config::default();
        let mut watch = WatchRegistry::default();

        let feed = evaluate(
            &upstream(vec![candidate("0xthin", 15, 500.0, 20)]),
            &mut watch,
            &config,
            now(),
        );

        assert!(feed.entries.is_empty());
        assert_eq!(feed.meta.rejected["low_liquidity"], 1);
        assert!(!watch.watching.contains_key("0xthin"));
    }

    #[test]
    fn test_missing_upstream_degrades() {
        let config = Config::default();
        let mut watch = WatchRegistry::default();

        let feed = evaluate(&Feed::default(), &mut watch, &config, now());
        assert_eq!(feed.meta.status, FeedStatus::Degraded);
        assert_eq!(feed.meta.rejected["no_discovery_feed"], 1);
    }

    #[test]
    fn test_stale_watch_entries_pruned() {
        let config = Config::default(); // retention 2h
        let mut watch = WatchRegistry::default();
        watch.record_check("0xstale", now() - chrono::Duration::hours(3));

        evaluate(&upstream(Vec::new()), &mut watch, &config, now());
        assert!(!watch.watching.contains_key("0xstale"));
    }
}
