//! Discovery stage: the broad net
//!
//! Fans out over every snapshot source strategy, deduplicates, applies the
//! hard gates, scores and risk-tags the survivors, and rewrites the primary
//! candidate feed. Every observed token updates the token registry whether
//! or not it is emitted, since rejection must not erase anti-relist memory.

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::candidate::{Candidate, RiskTag};
use crate::config::Config;
use crate::feed::{Feed, FeedStatus};
use crate::paths;
use crate::registry::TokenRegistry;
use crate::snapshots::types::PairSnapshot;
use crate::snapshots::{default_sources, SnapshotClient};
use crate::store::JsonStore;
use std::collections::HashSet;
use std::sync::Arc;

pub const DISCOVERY_SCHEMA: &str = "trawler_discovery_v1";

// Soft-signal cutoffs; tags ride along for downstream stages, they never
// decide acceptance
const RISK_LOW_LIQUIDITY_USD: f64 = 5_000.0;
const RISK_VERY_LOW_LIQUIDITY_USD: f64 = 2_000.0;
const RISK_LOW_ACTIVITY_TXNS_5M: u32 = 5;
const RISK_LOW_VOLUME_5M_USD: f64 = 100.0;
const RISK_DUMPING_CHANGE_5M_PCT: f64 = -10.0;

/// One raw pair snapshot tagged with the strategy that found it
#[derive(Debug, Clone)]
pub struct RawObservation {
    pub source: String,
    pub source_bonus: f64,
    pub pair: PairSnapshot,
}

/// Fetch outcome across the source fan-out
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchSummary {
    pub sources_total: usize,
    pub sources_failed: usize,
}

/// Run one discovery pass end to end
pub async fn run(config: &Config) -> anyhow::Result<Feed<Candidate>> {
    let client = Arc::new(SnapshotClient::new(&config.http));
    let sources = default_sources(Arc::clone(&client), &config.chain_id, &config.discovery);

    let mut raw = Vec::new();
    let mut summary = FetchSummary {
        sources_total: sources.len(),
        sources_failed: 0,
    };

    for source in &sources {
        match source.fetch().await {
            Ok(pairs) => {
                info!("[DISCOVERY] source {}: {} pairs", source.name(), pairs.len());
                raw.extend(pairs.into_iter().map(|pair| RawObservation {
                    source: source.name().to_string(),
                    source_bonus: source.score_bonus(),
                    pair,
                }));
            }
            Err(e) => {
                // fail-soft: one dead source degrades the run, it never aborts it
                warn!("[DISCOVERY] source {} failed: {}", source.name(), e);
                summary.sources_failed += 1;
            }
        }
    }

    let registry_store: JsonStore<TokenRegistry> = JsonStore::new(paths::get_token_registry_path());
    let mut registry = registry_store.load();

    let feed = evaluate(raw, summary, &mut registry, config, Utc::now());

    registry_store.save(&registry)?;

    let feed_store: JsonStore<Feed<Candidate>> = JsonStore::new(paths::get_discovery_feed_path());
    feed_store.save(&feed)?;

    info!(
        "[DISCOVERY] {} candidates, status {}, rejected {:?}",
        feed.meta.count,
        feed.meta.status.as_str(),
        feed.meta.rejected
    );

    Ok(feed)
}

/// The pure discovery core: dedup, gate, score, tag
///
/// Updates the registry in place (first-seen inserts + history appends) for
/// every snapshot carrying a token address, including ones that are
/// subsequently rejected.
pub fn evaluate(
    raw: Vec<RawObservation>,
    summary: FetchSummary,
    registry: &mut TokenRegistry,
    config: &Config,
    now: DateTime<Utc>,
) -> Feed<Candidate> {
    let policy = &config.discovery;
    let mut feed: Feed<Candidate> = Feed::new(DISCOVERY_SCHEMA, now);
    let raw_count = raw.len();

    let mut seen_pools: HashSet<String> = HashSet::new();
    let mut seen_tokens: HashSet<String> = HashSet::new();

    for observation in raw {
        let pair = &observation.pair;

        // -- dedup (first occurrence wins, no merging) ------------------------
        let pool_key = pair.pair_address.to_lowercase();
        if pool_key.is_empty() {
            feed.reject("no_pool");
            continue;
        }
        if !seen_pools.insert(pool_key) {
            feed.reject("duplicate_pool");
            continue;
        }

        let token_address = match pair.base_address() {
            Some(addr) => addr.to_lowercase(),
            None => {
                feed.reject("no_token");
                continue;
            }
        };
        if !seen_tokens.insert(token_address.clone()) {
            feed.reject("duplicate_token");
            continue;
        }

        // -- registry side effect, before any gate ----------------------------
        let symbol = pair.base_token.symbol.clone().unwrap_or_default();
        let name = pair.base_token.name.clone().unwrap_or_default();
        registry.observe(
            &token_address,
            &symbol,
            &name,
            pair.price_usd_value(),
            pair.liquidity_usd(),
            now,
            config.registry.history_cap,
        );

        // -- anti-relist ------------------------------------------------------
        let token_age_hours = registry
            .age_hours(&token_address, now)
            .unwrap_or(0.0);
        if token_age_hours > policy.relist_horizon_hours {
            feed.reject("known_token");
            continue;
        }

        // -- identity gates ---------------------------------------------------
        if config
            .bluechip_symbols
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&symbol))
        {
            feed.reject("bluechip");
            continue;
        }

        let quote_symbol = pair.quote_token.symbol.clone().unwrap_or_default();
        if !config
            .quote_whitelist
            .iter()
            .any(|q| q.eq_ignore_ascii_case(&quote_symbol))
        {
            feed.reject("bad_quote");
            continue;
        }

        // -- age window, with the high-liquidity widening ---------------------
        let first_seen = registry
            .get(&token_address)
            .map(|e| e.first_seen)
            .unwrap_or(now);
        let age_minutes = match pair.pair_created_at {
            Some(ms) => (now.timestamp_millis() - ms) as f64 / 60_000.0,
            None => (now - first_seen).num_seconds() as f64 / 60.0,
        };

        let liquidity = pair.liquidity_usd();
        if age_minutes > policy.max_age_minutes {
            let widened = liquidity >= policy.exception_liquidity_floor_usd
                && age_minutes <= policy.exception_max_age_minutes;
            if !widened {
                feed.reject("too_old");
                continue;
            }
        }

        // -- activity floors --------------------------------------------------
        if liquidity < policy.min_liquidity_usd {
            feed.reject("low_liquidity");
            continue;
        }
        if pair.volume_m5() < policy.min_volume_5m_usd && pair.volume_h1() < policy.min_volume_1h_usd
        {
            feed.reject("low_volume");
            continue;
        }
        if pair.txns_m5() < policy.min_txns_5m {
            feed.reject("low_activity");
            continue;
        }

        // -- score + tags -----------------------------------------------------
        let mut candidate = Candidate::from_pair(
            pair,
            &observation.source,
            observation.source_bonus,
            age_minutes.max(0.0),
            first_seen,
        );
        candidate.scores.composite = composite_score(&candidate, config);
        candidate.scores.freshness =
            (1.0 - candidate.age_minutes / policy.max_age_minutes).clamp(0.0, 1.0);
        candidate.risk_tags = risk_tags(&candidate);

        feed.entries.push(candidate);
    }

    // most promising first; younger breaks ties
    feed.entries.sort_by(|a, b| {
        b.scores
            .composite
            .partial_cmp(&a.scores.composite)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                a.age_minutes
                    .partial_cmp(&b.age_minutes)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });
    feed.entries.truncate(policy.max_candidates);

    let status = if !feed.entries.is_empty() {
        FeedStatus::Ok
    } else if raw_count == 0 && summary.sources_failed > 0 {
        FeedStatus::Degraded
    } else {
        FeedStatus::Calm
    };

    feed.finalize(status, serde_json::to_value(policy).ok());
    feed
}

/// Composite score: pure function of the current snapshot and age
fn composite_score(candidate: &Candidate, config: &Config) -> f64 {
    let weights = &config.discovery.score;
    let metrics = &candidate.metrics;
    let mut score = weights.base;

    // age bucket, strongest for the freshest pools
    score += if candidate.age_minutes < weights.fresh_age_minutes {
        weights.age_bonus_fresh
    } else if candidate.age_minutes < weights.recent_age_minutes {
        weights.age_bonus_recent
    } else {
        weights.age_bonus_aging
    };

    if metrics.liquidity_usd > 1.0 {
        score += (metrics.liquidity_usd.log10() / weights.liquidity_log_divisor).min(1.0)
            * weights.liquidity_weight;
    }
    if metrics.volume_1h_usd > 1.0 {
        score += (metrics.volume_1h_usd.log10() / weights.volume_log_divisor).min(1.0)
            * weights.volume_weight;
    }
    score += (metrics.txns_1h as f64 / weights.txn_norm).min(1.0) * weights.txn_weight;
    score += candidate.scores.source_bonus;

    score.clamp(0.0, 100.0)
}

fn risk_tags(candidate: &Candidate) -> Vec<RiskTag> {
    let metrics = &candidate.metrics;
    let mut tags = Vec::new();

    if metrics.liquidity_usd < RISK_LOW_LIQUIDITY_USD {
        tags.push(RiskTag::LowLiquidity);
    }
    if metrics.liquidity_usd < RISK_VERY_LOW_LIQUIDITY_USD {
        tags.push(RiskTag::VeryLowLiquidity);
    }
    if metrics.txns_5m < RISK_LOW_ACTIVITY_TXNS_5M {
        tags.push(RiskTag::LowActivity);
    }
    if metrics.volume_5m_usd < RISK_LOW_VOLUME_5M_USD {
        tags.push(RiskTag::LowVolume);
    }
    if matches!(metrics.price_change_5m_pct, Some(change) if change < RISK_DUMPING_CHANGE_5M_PCT) {
        tags.push(RiskTag::Dumping);
    }

    tags
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshots::types::{LiquidityBlock, TokenDescriptor, TxnCounts};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn pair(token: &str, pool: &str, age_minutes: i64, liquidity: f64) -> PairSnapshot {
        let mut pair = PairSnapshot::default();
        pair.chain_id = "base".to_string();
        pair.dex_id = "aerodrome".to_string();
        pair.pair_address = pool.to_string();
        pair.base_token = TokenDescriptor {
            address: Some(token.to_string()),
            name: Some("Example".to_string()),
            symbol: Some("EXM".to_string()),
        };
        pair.quote_token = TokenDescriptor {
            address: Some("0xweth".to_string()),
            name: Some("Wrapped Ether".to_string()),
            symbol: Some("WETH".to_string()),
        };
        pair.pair_created_at = Some(now().timestamp_millis() - age_minutes * 60_000);
        pair.liquidity = LiquidityBlock {
            usd: Some(liquidity),
            base: None,
            quote: None,
        };
        pair.volume.m5 = Some(500.0);
        pair.volume.h1 = Some(4_000.0);
        pair.txns.m5 = TxnCounts {
            buys: Some(4),
            sells: Some(2),
        };
        pair.txns.h1 = TxnCounts {
            buys: Some(30),
            sells: Some(20),
        };
        pair.price_usd = Some("0.01".to_string());
        pair
    }

    fn observation(pair: PairSnapshot) -> RawObservation {
        RawObservation {
            source: "search".to_string(),
            source_bonus: 0.0,
            pair,
        }
    }

    fn ok_summary() -> FetchSummary {
        FetchSummary {
            sources_total: 4,
            sources_failed: 0,
        }
    }

    #[test]
    fn test_accepts_a_fresh_pool() {
        let mut registry = TokenRegistry::default();
        let config = Config::default();
        let feed = evaluate(
            vec![observation(pair("0xtok", "0xpool", 20, 9_000.0))],
            ok_summary(),
            &mut registry,
            &config,
            now(),
        );

        assert_eq!(feed.entries.len(), 1);
        assert_eq!(feed.meta.status, FeedStatus::Ok);
        assert!(feed.entries[0].scores.composite > 0.0);
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let config = Config::default();
        let observed = pair("0xtok", "0xpool", 20, 9_000.0);

        let mut registry_a = TokenRegistry::default();
        let feed_a = evaluate(
            vec![observation(observed.clone())],
            ok_summary(),
            &mut registry_a,
            &config,
            now(),
        );
        let mut registry_b = TokenRegistry::default();
        let feed_b = evaluate(
            vec![observation(observed)],
            ok_summary(),
            &mut registry_b,
            &config,
            now(),
        );

        assert_eq!(
            feed_a.entries[0].scores.composite,
            feed_b.entries[0].scores.composite
        );
    }

    #[test]
    fn test_anti_relist_rejects_known_token() {
        let mut registry = TokenRegistry::default();
        // token first seen 49h ago, well past the 48h relist horizon
        let long_ago = now() - chrono::Duration::hours(49);
        registry.observe("0xtok", "EXM", "Example", Some(0.01), 9_000.0, long_ago, 288);

        let config = Config::default();
        // pool metrics would pass every threshold
        let feed = evaluate(
            vec![observation(pair("0xtok", "0xpool", 20, 50_000.0))],
            ok_summary(),
            &mut registry,
            &config,
            now(),
        );

        assert!(feed.entries.is_empty());
        assert_eq!(feed.meta.rejected["known_token"], 1);
        // first_seen unchanged by the re-observation
        assert_eq!(registry.get("0xtok").unwrap().first_seen, long_ago);
    }

    #[test]
    fn test_too_old_unless_high_liquidity_exception() {
        let config = Config::default();

        // $1,500 pool at 65 minutes: outside the window, no exception
        let mut registry = TokenRegistry::default();
        let feed = evaluate(
            vec![observation(pair("0xtok", "0xpool", 65, 1_500.0))],
            ok_summary(),
            &mut registry,
            &config,
            now(),
        );
        assert!(feed.entries.is_empty());
        assert_eq!(feed.meta.rejected["too_old"], 1);

        // same age but above the exception floor: kept
        let mut registry = TokenRegistry::default();
        let feed = evaluate(
            vec![observation(pair("0xtok2", "0xpool2", 65, 15_000.0))],
            ok_summary(),
            &mut registry,
            &config,
            now(),
        );
        assert_eq!(feed.entries.len(), 1);

        // exception only widens so far
        let mut registry = TokenRegistry::default();
        let feed = evaluate(
            vec![observation(pair("0xtok3", "0xpool3", 200, 15_000.0))],
            ok_summary(),
            &mut registry,
            &config,
            now(),
        );
        assert!(feed.entries.is_empty());
    }

    #[test]
    fn test_rejected_candidates_still_update_registry() {
        // Intentional: rejection and registry tracking are not mutually
        // exclusive; the registry is the anti-relist memory.
        let mut registry = TokenRegistry::default();
        let config = Config::default();

        let feed = evaluate(
            vec![observation(pair("0xtok", "0xpool", 20, 100.0))], // fails liquidity floor
            ok_summary(),
            &mut registry,
            &config,
            now(),
        );

        assert!(feed.entries.is_empty());
        assert_eq!(feed.meta.rejected["low_liquidity"], 1);
        let entry = registry.get("0xtok").unwrap();
        assert_eq!(entry.history.len(), 1);
        assert_eq!(entry.history[0].liquidity_usd, 100.0);
    }

    #[test]
    fn test_duplicate_pool_first_occurrence_wins() {
        let mut registry = TokenRegistry::default();
        let config = Config::default();

        let first = pair("0xtok", "0xPool", 20, 9_000.0);
        let mut second = pair("0xother", "0xpool", 20, 50_000.0);
        second.base_token.symbol = Some("OTHER".to_string());

        let feed = evaluate(
            vec![observation(first), observation(second)],
            ok_summary(),
            &mut registry,
            &config,
            now(),
        );

        assert_eq!(feed.entries.len(), 1);
        assert_eq!(feed.entries[0].token.address, "0xtok");
        assert_eq!(feed.meta.rejected["duplicate_pool"], 1);
    }

    #[test]
    fn test_missing_token_address_rejected() {
        let mut registry = TokenRegistry::default();
        let config = Config::default();
        let mut broken = pair("0xtok", "0xpool", 20, 9_000.0);
        broken.base_token.address = None;

        let feed = evaluate(
            vec![observation(broken)],
            ok_summary(),
            &mut registry,
            &config,
            now(),
        );

        assert!(feed.entries.is_empty());
        assert_eq!(feed.meta.rejected["no_token"], 1);
        assert!(registry.tokens.is_empty());
    }

    #[test]
    fn test_risk_tags_ride_along_on_accepted_candidates() {
        let mut registry = TokenRegistry::default();
        let config = Config::default();
        let mut thin = pair("0xtok", "0xpool", 20, 1_500.0);
        thin.price_change.m5 = Some(-15.0);
        thin.txns.m5 = TxnCounts {
            buys: Some(2),
            sells: Some(1),
        };
        thin.volume.m5 = Some(60.0);

        let feed = evaluate(
            vec![observation(thin)],
            ok_summary(),
            &mut registry,
            &config,
            now(),
        );

        assert_eq!(feed.entries.len(), 1);
        let tags = &feed.entries[0].risk_tags;
        assert!(tags.contains(&RiskTag::LowLiquidity));
        assert!(tags.contains(&RiskTag::VeryLowLiquidity));
        assert!(tags.contains(&RiskTag::LowActivity));
        assert!(tags.contains(&RiskTag::LowVolume));
        assert!(tags.contains(&RiskTag::Dumping));
    }

    #[test]
    fn test_status_reflects_fan_out_outcome() {
        let config = Config::default();

        // all sources dead, nothing raw: degraded
        let mut registry = TokenRegistry::default();
        let feed = evaluate(
            Vec::new(),
            FetchSummary {
                sources_total: 4,
                sources_failed: 4,
            },
            &mut registry,
            &config,
            now(),
        );
        assert_eq!(feed.meta.status, FeedStatus::Degraded);

        // sources fine but nothing passed: calm
        let mut registry = TokenRegistry::default();
        let feed = evaluate(
            vec![observation(pair("0xtok", "0xpool", 20, 100.0))],
            ok_summary(),
            &mut registry,
            &config,
            now(),
        );
        assert_eq!(feed.meta.status, FeedStatus::Calm);
    }

    #[test]
    fn test_output_is_ranked_and_capped() {
        let mut config = Config::default();
        config.discovery.max_candidates = 2;
        let mut registry = TokenRegistry::default();

        let observations = vec![
            observation(pair("0xa", "0xpa", 50, 3_000.0)),
            observation(pair("0xb", "0xpb", 5, 9_000.0)),
            observation(pair("0xc", "0xpc", 25, 5_000.0)),
        ];
        let feed = evaluate(observations, ok_summary(), &mut registry, &config, now());

        assert_eq!(feed.entries.len(), 2);
        assert!(feed.entries[0].scores.composite >= feed.entries[1].scores.composite);
        // the freshest, deepest pool wins
        assert_eq!(feed.entries[0].token.address, "0xb");
    }
}
