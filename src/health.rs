//! Health monitor: discovery feed watchdog
//!
//! Independent of all token logic: it only answers "is the primary feed
//! fresh, well-formed, and non-empty". Structural problems and staleness
//! fail immediately. A validly empty feed is tolerated in scheduled mode
//! until the consecutive-empty streak hits the cap; a manual invocation
//! with an empty feed fails regardless of streak. Any fresh, well-formed,
//! non-empty feed resets the streak to zero.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::config::HealthPolicy;
use crate::store::JsonStore;
use crate::{config::Config, paths};

pub const HEALTH_SCHEMA: &str = "trawler_health_v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthState {
    pub schema: String,
    /// Consecutive runs that saw an empty or broken feed
    pub empty_streak: u32,
    /// Last run that passed, in either mode
    pub last_check: Option<DateTime<Utc>>,
    /// Last time the feed actually contained candidates
    pub last_nonempty: Option<DateTime<Utc>>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            schema: HEALTH_SCHEMA.to_string(),
            empty_streak: 0,
            last_check: None,
            last_nonempty: None,
        }
    }
}

/// How the check was invoked; manual runs have zero tolerance for emptiness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Scheduled,
    Manual,
}

/// What the feed file looked like on disk
#[derive(Debug, Clone)]
pub enum FeedProbe {
    Missing,
    Unparseable(String),
    Parsed(Value),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthOutcome {
    /// Fresh, well-formed, non-empty
    Healthy { count: usize },
    /// Empty but valid, within the scheduled-mode tolerance
    EmptyTolerated { streak: u32 },
    Failed { reason: String },
}

impl HealthOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, HealthOutcome::Failed { .. })
    }
}

/// Probe the discovery feed file
pub fn probe_feed(path: &Path) -> FeedProbe {
    if !path.exists() {
        return FeedProbe::Missing;
    }
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(value) => FeedProbe::Parsed(value),
            Err(e) => FeedProbe::Unparseable(e.to_string()),
        },
        Err(e) => FeedProbe::Unparseable(e.to_string()),
    }
}

/// Run one health check end to end, returning the process exit code
pub fn run(config: &Config, mode: RunMode) -> anyhow::Result<i32> {
    let state_store: JsonStore<HealthState> = JsonStore::new(paths::get_health_state_path());
    let mut state = state_store.load();

    let probe = probe_feed(&paths::get_discovery_feed_path());
    let outcome = evaluate(probe, &mut state, mode, &config.health, Utc::now());

    // state is saved whatever the verdict, atomically
    state_store.save(&state)?;

    match &outcome {
        HealthOutcome::Healthy { count } => {
            info!("[HEALTH] Feed healthy: {count} candidates");
            Ok(0)
        }
        HealthOutcome::EmptyTolerated { streak } => {
            warn!("[HEALTH] Empty feed tolerated (streak {streak})");
            Ok(0)
        }
        HealthOutcome::Failed { reason } => {
            warn!("[HEALTH] FAIL: {reason} (streak {})", state.empty_streak);
            Ok(1)
        }
    }
}

/// The pure validation ladder
///
/// Hard failures increment the streak and fail immediately; emptiness
/// increments the streak subject to mode and cap; success resets it.
pub fn evaluate(
    probe: FeedProbe,
    state: &mut HealthState,
    mode: RunMode,
    policy: &HealthPolicy,
    now: DateTime<Utc>,
) -> HealthOutcome {
    let document = match probe {
        FeedProbe::Missing => {
            state.empty_streak += 1;
            return HealthOutcome::Failed {
                reason: "feed_missing".to_string(),
            };
        }
        FeedProbe::Unparseable(e) => {
            state.empty_streak += 1;
            return HealthOutcome::Failed {
                reason: format!("invalid_json: {e}"),
            };
        }
        FeedProbe::Parsed(value) => value,
    };

    // structural checks
    let schema_ok = document.get("schema").and_then(Value::as_str).is_some();
    let meta = document.get("meta").and_then(Value::as_object);
    let entries = document.get("entries").and_then(Value::as_array);
    if !schema_ok || meta.is_none() || entries.is_none() {
        state.empty_streak += 1;
        return HealthOutcome::Failed {
            reason: "invalid_structure".to_string(),
        };
    }

    // generation timestamp, parseable and fresh
    let generated_at = meta
        .and_then(|m| m.get("generated_at"))
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));
    let generated_at = match generated_at {
        Some(t) => t,
        None => {
            state.empty_streak += 1;
            return HealthOutcome::Failed {
                reason: "missing_generated_at".to_string(),
            };
        }
    };

    let age_minutes = (now - generated_at).num_minutes();
    if age_minutes > policy.max_feed_age_minutes {
        state.empty_streak += 1;
        return HealthOutcome::Failed {
            reason: format!("stale_feed_{age_minutes}m"),
        };
    }

    let count = entries.map(|e| e.len()).unwrap_or(0);
    if count == 0 {
        state.empty_streak += 1;

        if mode == RunMode::Manual {
            return HealthOutcome::Failed {
                reason: "empty_feed_manual".to_string(),
            };
        }
        if state.empty_streak >= policy.max_empty_streak {
            return HealthOutcome::Failed {
                reason: format!("empty_streak_{}", state.empty_streak),
            };
        }

        state.last_check = Some(now);
        return HealthOutcome::EmptyTolerated {
            streak: state.empty_streak,
        };
    }

    state.empty_streak = 0;
    state.last_check = Some(now);
    state.last_nonempty = Some(now);
    HealthOutcome::Healthy { count }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn policy() -> HealthPolicy {
        HealthPolicy {
            max_empty_streak: 2,
            max_feed_age_minutes: 30,
        }
    }

    fn feed_json(count: usize, generated_at: DateTime<Utc>) -> FeedProbe {
        let entries: Vec<Value> = (0..count).map(|_| serde_json::json!({})).collect();
        FeedProbe::Parsed(serde_json::json!({
            "schema": "trawler_discovery_v1",
            "meta": { "generated_at": generated_at.to_rfc3339(), "status": "ok" },
            "entries": entries,
        }))
    }

    #[test]
    fn test_missing_feed_fails_hard() {
        let mut state = HealthState::default();
        let outcome = evaluate(FeedProbe::Missing, &mut state, RunMode::Scheduled, &policy(), now());
        assert!(outcome.is_failure());
        assert_eq!(state.empty_streak, 1);
    }

    #[test]
    fn test_invalid_structure_fails_hard() {
        let mut state = HealthState::default();
        let probe = FeedProbe::Parsed(serde_json::json!({"schema": "x"}));
        let outcome = evaluate(probe, &mut state, RunMode::Scheduled, &policy(), now());
        assert_eq!(
            outcome,
            HealthOutcome::Failed {
                reason: "invalid_structure".to_string()
            }
        );
    }

    #[test]
    fn test_stale_feed_fails_even_with_candidates() {
        let mut state = HealthState::default();
        let probe = feed_json(5, now() - chrono::Duration::minutes(45));
        let outcome = evaluate(probe, &mut state, RunMode::Scheduled, &policy(), now());
        assert!(outcome.is_failure());
        assert_eq!(state.empty_streak, 1);
    }

    #[test]
    fn test_empty_streak_accumulates_then_fails_at_cap() {
        let mut state = HealthState::default();

        // first empty run is tolerated
        let outcome = evaluate(feed_json(0, now()), &mut state, RunMode::Scheduled, &policy(), now());
        assert_eq!(outcome, HealthOutcome::EmptyTolerated { streak: 1 });

        // second consecutive empty run hits the cap
        let outcome = evaluate(feed_json(0, now()), &mut state, RunMode::Scheduled, &policy(), now());
        assert!(outcome.is_failure());
        assert_eq!(state.empty_streak, 2);
    }

    #[test]
    fn test_nonempty_feed_resets_streak() {
        let mut state = HealthState::default();
        state.empty_streak = 1;

        let outcome = evaluate(feed_json(3, now()), &mut state, RunMode::Scheduled, &policy(), now());
        assert_eq!(outcome, HealthOutcome::Healthy { count: 3 });
        assert_eq!(state.empty_streak, 0);
        assert_eq!(state.last_nonempty, Some(now()));
    }

    #[test]
    fn test_manual_mode_fails_empty_feed_immediately() {
        let mut state = HealthState::default();
        // streak is zero; a scheduled run would tolerate this
        let outcome = evaluate(feed_json(0, now()), &mut state, RunMode::Manual, &policy(), now());
        assert_eq!(
            outcome,
            HealthOutcome::Failed {
                reason: "empty_feed_manual".to_string()
            }
        );
    }

    #[test]
    fn test_streak_sequence_matches_run_history() {
        // N consecutive empty feeds produce streak = N, then one non-empty
        // feed resets to zero
        let lenient = HealthPolicy {
            max_empty_streak: 10,
            max_feed_age_minutes: 30,
        };
        let mut state = HealthState::default();

        for expected in 1..=4u32 {
            evaluate(feed_json(0, now()), &mut state, RunMode::Scheduled, &lenient, now());
            assert_eq!(state.empty_streak, expected);
        }

        evaluate(feed_json(1, now()), &mut state, RunMode::Scheduled, &lenient, now());
        assert_eq!(state.empty_streak, 0);
    }
}
