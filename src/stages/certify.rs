//! Certification stage: two-checkpoint survivorship gate
//!
//! The certified feed is durable: entries are carried forward run to run,
//! upgraded in place from the first checkpoint to the second, and never
//! removed or downgraded. Failing a checkpoint only records the reasons;
//! the candidate is re-evaluated on every later run. The published health
//! score is recomputed from current metrics every run, certification or
//! not, so the feed always reflects present health rather than the moment
//! of promotion.

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::candidate::{Candidate, PipelineStatus};
use crate::config::{CheckpointThresholds, Config};
use crate::feed::{Feed, FeedStatus};
use crate::paths;
use crate::store::JsonStore;

pub const CERTIFIED_SCHEMA: &str = "trawler_certified_v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    First,
    Second,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Checkpoint::First
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertifiedEntry {
    /// Snapshot frozen at the moment the checkpoint was passed
    pub candidate: Candidate,
    pub checkpoint: Checkpoint,
    pub certified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgraded_at: Option<DateTime<Utc>>,
    /// Blended liquidity/volume/txn health vs. the checkpoint's targets,
    /// refreshed every run
    pub health_score: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CertifyReport {
    pub newly_certified: usize,
    pub upgraded: usize,
}

pub fn run(config: &Config) -> anyhow::Result<Feed<CertifiedEntry>> {
    let discovery_path = paths::get_discovery_feed_path();
    let upstream: Feed<Candidate> = if discovery_path.exists() {
        JsonStore::new(&discovery_path).load()
    } else {
        Feed::default()
    };

    let certified_store: JsonStore<Feed<CertifiedEntry>> =
        JsonStore::new(paths::get_certified_feed_path());
    let previous = certified_store.load();

    let (feed, report) = evaluate(&upstream, previous, config, Utc::now());

    certified_store.save(&feed)?;

    info!(
        "[CERTIFY] {} certified ({} new, {} upgraded), status {}",
        feed.meta.count,
        report.newly_certified,
        report.upgraded,
        feed.meta.status.as_str()
    );

    Ok(feed)
}

pub fn evaluate(
    upstream: &Feed<Candidate>,
    previous: Feed<CertifiedEntry>,
    config: &Config,
    now: DateTime<Utc>,
) -> (Feed<CertifiedEntry>, CertifyReport) {
    let policy = &config.certification;
    let mut feed: Feed<CertifiedEntry> = Feed::new(CERTIFIED_SCHEMA, now);
    let mut report = CertifyReport::default();

    // durable: every previously certified pool is carried forward
    let mut existing: BTreeMap<String, CertifiedEntry> = previous
        .entries
        .into_iter()
        .map(|e| (e.candidate.pool_address.clone(), e))
        .collect();

    let upstream_missing = upstream.schema.is_empty();
    if upstream_missing {
        feed.reject("no_discovery_feed");
    }

    let mut fresh: Vec<CertifiedEntry> = Vec::new();

    for candidate in &upstream.entries {
        let age_hours = candidate.age_minutes_at(now) / 60.0;

        if let Some(entry) = existing.get_mut(&candidate.pool_address) {
            // health always tracks current metrics
            let thresholds = match entry.checkpoint {
                Checkpoint::First => &policy.first,
                Checkpoint::Second => &policy.second,
            };
            entry.health_score = health_score(candidate, thresholds, config);

            // upgrade is the only permitted transition
            if entry.checkpoint == Checkpoint::First && age_hours >= policy.second_checkpoint_hours {
                let (passed, required, reasons) =
                    run_checks(candidate, &policy.second, false);
                if passed >= required {
                    let mut upgraded = candidate.clone();
                    upgraded.status = PipelineStatus::CertifiedSecond;
                    upgraded.age_minutes = age_hours * 60.0;
                    entry.candidate = upgraded;
                    entry.checkpoint = Checkpoint::Second;
                    entry.upgraded_at = Some(now);
                    entry.health_score = health_score(candidate, &policy.second, config);
                    report.upgraded += 1;
                } else {
                    for reason in reasons {
                        feed.reject(reason);
                    }
                }
            }
            continue;
        }

        if age_hours < policy.first_checkpoint_hours {
            feed.reject("below_first_checkpoint");
            continue;
        }

        let (passed, required, reasons) = run_checks(candidate, &policy.first, true);
        if passed >= required {
            let mut certified = candidate.clone();
            certified.status = PipelineStatus::CertifiedFirst;
            certified.age_minutes = age_hours * 60.0;
            let score = health_score(candidate, &policy.first, config);
            fresh.push(CertifiedEntry {
                candidate: certified,
                checkpoint: Checkpoint::First,
                certified_at: now,
                upgraded_at: None,
                health_score: score,
            });
            report.newly_certified += 1;
        } else {
            for reason in reasons {
                feed.reject(reason);
            }
        }
    }

    // newest certifications lead the feed
    feed.entries = fresh;
    feed.entries.extend(existing.into_values());

    let status = if upstream_missing {
        FeedStatus::Degraded
    } else if feed.entries.is_empty() {
        FeedStatus::Calm
    } else {
        FeedStatus::Ok
    };
    feed.finalize(status, serde_json::to_value(policy).ok());
    (feed, report)
}

/// Evaluate a checkpoint's threshold set
///
/// Returns (passed, required, failing reasons). Holders only participate
/// when the snapshot carries a count; the quorum shrinks by one when the
/// data is unavailable rather than failing the check.
fn run_checks(
    candidate: &Candidate,
    thresholds: &CheckpointThresholds,
    holders_in_quorum: bool,
) -> (u32, u32, Vec<&'static str>) {
    let metrics = &candidate.metrics;
    let mut passed = 0;
    let mut required = 3;
    let mut reasons = Vec::new();

    if metrics.liquidity_usd >= thresholds.min_liquidity_usd {
        passed += 1;
    } else {
        reasons.push("liquidity_below_target");
    }
    if metrics.volume_24h_usd >= thresholds.min_volume_24h_usd {
        passed += 1;
    } else {
        reasons.push("volume_below_target");
    }
    if metrics.txns_24h >= thresholds.min_txns_24h {
        passed += 1;
    } else {
        reasons.push("txns_below_target");
    }

    if holders_in_quorum {
        if let Some(holders) = metrics.holders {
            required = 4;
            if holders >= thresholds.min_holders {
                passed += 1;
            } else {
                reasons.push("holders_below_target");
            }
        }
    }

    (passed, required, reasons)
}

/// Weighted blend of metric ratios against the checkpoint targets
fn health_score(candidate: &Candidate, thresholds: &CheckpointThresholds, config: &Config) -> f64 {
    let policy = &config.certification;
    let metrics = &candidate.metrics;

    let liq_ratio = (metrics.liquidity_usd / thresholds.min_liquidity_usd).min(1.0);
    let vol_ratio = (metrics.volume_24h_usd / thresholds.min_volume_24h_usd).min(1.0);
    let txn_ratio = (metrics.txns_24h as f64 / thresholds.min_txns_24h as f64).min(1.0);

    let score = 100.0
        * (policy.health_liquidity_weight * liq_ratio
            + policy.health_volume_weight * vol_ratio
            + policy.health_txn_weight * txn_ratio);
    (score * 10.0).round() / 10.0
}

// =============================================================================
// TESTS
// =============================================================================
