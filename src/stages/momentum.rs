//! Momentum stage: hours-to-a-day acceleration ranking
//!
//! A ranking-only gate: no risk rejection happens here. Discovery
//! candidates inside the mid-horizon window are scored on a bell-shaped age
//! bonus, capped liquidity, volume acceleration against the implied hourly
//! average, transaction density, and a pass-through slice of the discovery
//! score.

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::candidate::{Candidate, PipelineStatus};
use crate::config::Config;
use crate::feed::{Feed, FeedStatus};
use crate::paths;
use crate::store::JsonStore;

pub const MOMENTUM_SCHEMA: &str = "trawler_momentum_v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeTrend {
    Up,
    Stable,
    Down,
}

impl Default for VolumeTrend {
    fn default() -> Self {
        VolumeTrend::Stable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnDensity {
    High,
    Medium,
    Low,
}

impl Default for TxnDensity {
    fn default() -> Self {
        TxnDensity::Low
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MomentumEntry {
    pub candidate: Candidate,
    pub momentum_score: f64,
    pub volume_trend: VolumeTrend,
    pub txn_density: TxnDensity,
}

pub fn run(config: &Config) -> anyhow::Result<Feed<MomentumEntry>> {
    let discovery_path = paths::get_discovery_feed_path();
    let upstream: Feed<Candidate> = if discovery_path.exists() {
        JsonStore::new(&discovery_path).load()
    } else {
        Feed::default()
    };

    let feed = evaluate(&upstream, config, Utc::now());

    let feed_store: JsonStore<Feed<MomentumEntry>> = JsonStore::new(paths::get_momentum_feed_path());
    feed_store.save(&feed)?;

    info!(
        "[MOMENTUM] {} ranked, status {}, rejected {:?}",
        feed.meta.count,
        feed.meta.status.as_str(),
        feed.meta.rejected
    );

    Ok(feed)
}

pub fn evaluate(upstream: &Feed<Candidate>, config: &Config, now: DateTime<Utc>) -> Feed<MomentumEntry> {
    let policy = &config.momentum;
    let mut feed: Feed<MomentumEntry> = Feed::new(MOMENTUM_SCHEMA, now);

    if upstream.schema.is_empty() {
        feed.reject("no_discovery_feed");
        feed.finalize(FeedStatus::Degraded, serde_json::to_value(policy).ok());
        return feed;
    }

    for candidate in &upstream.entries {
        let age_hours = candidate.age_minutes_at(now) / 60.0;
        let metrics = &candidate.metrics;

        if age_hours < policy.min_age_hours || age_hours > policy.max_age_hours {
            feed.reject(if age_hours < policy.min_age_hours {
                "too_young"
            } else {
                "too_old"
            });
            continue;
        }
        if metrics.liquidity_usd < policy.min_liquidity_usd {
            feed.reject("low_liquidity");
            continue;
        }
        if metrics.txns_24h < policy.min_txns_24h {
            feed.reject("low_activity");
            continue;
        }

        let score = momentum_score(candidate, age_hours, config);

        let implied_hourly = metrics.volume_24h_usd / 24.0;
        let volume_trend = if implied_hourly <= 0.0 {
            VolumeTrend::Stable
        } else if metrics.volume_1h_usd > implied_hourly * 1.2 {
            VolumeTrend::Up
        } else if metrics.volume_1h_usd > implied_hourly * 0.8 {
            VolumeTrend::Stable
        } else {
            VolumeTrend::Down
        };

        let txn_density = if metrics.txns_1h > 30 {
            TxnDensity::High
        } else if metrics.txns_1h > 15 {
            TxnDensity::Medium
        } else {
            TxnDensity::Low
        };

        let mut entry = MomentumEntry {
            candidate: candidate.clone(),
            momentum_score: score,
            volume_trend,
            txn_density,
        };
        entry.candidate.status = PipelineStatus::Momentum;
        entry.candidate.age_minutes = age_hours * 60.0;
        feed.entries.push(entry);
    }

    feed.entries.sort_by(|a, b| {
        b.momentum_score
            .partial_cmp(&a.momentum_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    feed.entries.truncate(policy.max_candidates);

    let status = if feed.entries.is_empty() {
        FeedStatus::Calm
    } else {
        FeedStatus::Ok
    };
    feed.finalize(status, serde_json::to_value(policy).ok());
    feed
}

fn momentum_score(candidate: &Candidate, age_hours: f64, config: &Config) -> f64 {
    let weights = &config.momentum.score;
    let metrics = &candidate.metrics;
    let mut score = weights.base;

    // bell-shaped age bonus peaking mid-window
    score += if age_hours >= weights.peak_start_hours && age_hours <= weights.peak_end_hours {
        weights.peak_bonus
    } else if age_hours > weights.peak_end_hours && age_hours <= weights.shoulder_end_hours {
        weights.shoulder_bonus
    } else {
        weights.edge_bonus
    };

    score +=
        (metrics.liquidity_usd / weights.liquidity_ceiling_usd).min(1.0) * weights.liquidity_weight;

    let implied_hourly = metrics.volume_24h_usd / 24.0;
    if implied_hourly > 0.0 && metrics.volume_1h_usd > implied_hourly * weights.acceleration_multiple
    {
        score += weights.acceleration_bonus;
    }

    if metrics.txns_1h > weights.txn_density_floor_1h {
        score += weights.txn_density_bonus;
    }

    score += candidate.scores.composite * weights.discovery_passthrough;

    score.min(100.0)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{CandidateMetrics, CandidateScores, TokenIdentity};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn candidate(token: &str, age_hours: i64, metrics: CandidateMetrics, composite: f64) -> Candidate {
        Candidate {
            token: TokenIdentity {
                address: token.to_string(),
                symbol: "EXM".to_string(),
                name: "Example".to_string(),
            },
            pool_address: format!("{token}-pool"),
            metrics,
            scores: CandidateScores {
                composite,
                ..CandidateScores::default()
            },
            pair_created_at: Some(now() - chrono::Duration::hours(age_hours)),
            token_first_seen: now() - chrono::Duration::hours(age_hours),
            ..Candidate::default()
        }
    }

    fn active_metrics() -> CandidateMetrics {
        CandidateMetrics {
            liquidity_usd: 50_000.0,
            volume_1h_usd: 3_000.0,
            volume_24h_usd: 24_000.0,
            txns_1h: 25,
            txns_24h: 300,
            ..CandidateMetrics::default()
        }
    }

    fn upstream(entries: Vec<Candidate>) -> Feed<Candidate> {
        let mut feed = Feed::new("trawler_discovery_v1", now());
        feed.entries = entries;
        feed.finalize(FeedStatus::Ok, None);
        feed
    }

    #[test]
    fn test_window_and_floors() {
        let config = Config::default();
        let feed = evaluate(
            &upstream(vec![
                candidate("0xok", 8, active_metrics(), 70.0),
                candidate("0xtoo_new", 0, active_metrics(), 70.0),
                candidate("0xtoo_old", 30, active_metrics(), 70.0),
                candidate(
                    "0xquiet",
                    8,
                    CandidateMetrics {
                        txns_24h: 10,
                        ..active_metrics()
                    },
                    70.0,
                ),
            ]),
            &config,
            now(),
        );

        assert_eq!(feed.entries.len(), 1);
        assert_eq!(feed.entries[0].candidate.token.address, "0xok");
        assert_eq!(feed.meta.rejected["too_young"], 1);
        assert_eq!(feed.meta.rejected["too_old"], 1);
        assert_eq!(feed.meta.rejected["low_activity"], 1);
    }

    #[test]
    fn test_bell_peak_beats_window_edges() {
        let config = Config::default();
        let feed = evaluate(
            &upstream(vec![
                candidate("0xedge", 2, active_metrics(), 0.0),
                candidate("0xpeak", 8, active_metrics(), 0.0),
                candidate("0xshoulder", 15, active_metrics(), 0.0),
            ]),
            &config,
            now(),
        );

        assert_eq!(feed.entries[0].candidate.token.address, "0xpeak");
        assert_eq!(feed.entries[1].candidate.token.address, "0xshoulder");
        assert_eq!(feed.entries[2].candidate.token.address, "0xedge");
    }

    #[test]
    fn test_volume_acceleration_bonus() {
        let config = Config::default();

        // 24h volume implies $1k/h; 1h at $3k is accelerating
        let accelerating = active_metrics();
        let mut flat = active_metrics();
        flat.volume_1h_usd = 1_000.0;

        let feed = evaluate(
            &upstream(vec![
                candidate("0xaccel", 8, accelerating, 0.0),
                candidate("0xflat", 8, flat, 0.0),
            ]),
            &config,
            now(),
        );

        let accel = &feed.entries[0];
        let flat = &feed.entries[1];
        assert_eq!(accel.candidate.token.address, "0xaccel");
        assert_eq!(accel.volume_trend, VolumeTrend::Up);
        assert_eq!(flat.volume_trend, VolumeTrend::Stable);
        assert_eq!(
            accel.momentum_score - flat.momentum_score,
            config.momentum.score.acceleration_bonus
        );
    }

    #[test]
    fn test_discovery_score_passes_through() {
        let config = Config::default();
        let feed = evaluate(
            &upstream(vec![
                candidate("0xstrong", 8, active_metrics(), 90.0),
                candidate("0xweak", 8, active_metrics(), 40.0),
            ]),
            &config,
            now(),
        );

        assert_eq!(feed.entries[0].candidate.token.address, "0xstrong");
        let gap = feed.entries[0].momentum_score - feed.entries[1].momentum_score;
        assert!((gap - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_risk_rejection_reasons_exist() {
        // risky-looking metrics still rank; this stage only orders
        let config = Config::default();
        let mut risky = active_metrics();
        risky.liquidity_usd = 20_000.0;
        risky.price_change_5m_pct = Some(-20.0);

        let feed = evaluate(&upstream(vec![candidate("0xrisky", 8, risky, 50.0)]), &config, now());
        assert_eq!(feed.entries.len(), 1);
    }
}
