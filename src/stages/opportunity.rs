//! Opportunity stage: early, higher-risk shortlist
//!
//! Admits discovery candidates in the hours-old window (extended for deep
//! pools), requires activity on either the short or the long window (an
//! intentionally permissive OR gate), and ranks by a weighted opportunity
//! score net of an independently computed rug-risk score. Two findings are
//! disqualifying on their own: liquidity actively draining and suspected
//! wash trading. Everything else only depresses the rank.

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::candidate::{Candidate, PipelineStatus};
use crate::config::Config;
use crate::feed::{Feed, FeedStatus};
use crate::paths;
use crate::registry::TokenRegistry;
use crate::store::JsonStore;

pub const OPPORTUNITY_SCHEMA: &str = "trawler_opportunity_v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    LowLiquidity,
    SellPressure,
    MoreSells,
    LiquidityDropping,
    WashTrading,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpportunityEntry {
    pub candidate: Candidate,
    pub opportunity_score: f64,
    pub risk_score: f64,
    /// opportunity minus the configured fraction of risk; the feed's rank
    pub net_score: f64,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub risk_factors: Vec<RiskFactor>,
}

pub fn run(config: &Config) -> anyhow::Result<Feed<OpportunityEntry>> {
    let discovery_path = paths::get_discovery_feed_path();
    let upstream: Feed<Candidate> = if discovery_path.exists() {
        JsonStore::new(&discovery_path).load()
    } else {
        Feed::default()
    };

    let registry_store: JsonStore<TokenRegistry> = JsonStore::new(paths::get_token_registry_path());
    let registry = registry_store.load();

    let feed = evaluate(&upstream, &registry, config, Utc::now());

    let feed_store: JsonStore<Feed<OpportunityEntry>> =
        JsonStore::new(paths::get_opportunity_feed_path());
    feed_store.save(&feed)?;

    info!(
        "[OPPORTUNITY] {} ranked, status {}, rejected {:?}",
        feed.meta.count,
        feed.meta.status.as_str(),
        feed.meta.rejected
    );

    Ok(feed)
}

pub fn evaluate(
    upstream: &Feed<Candidate>,
    registry: &TokenRegistry,
    config: &Config,
    now: DateTime<Utc>,
) -> Feed<OpportunityEntry> {
    let policy = &config.opportunity;
    let mut feed: Feed<OpportunityEntry> = Feed::new(OPPORTUNITY_SCHEMA, now);

    if upstream.schema.is_empty() {
        feed.reject("no_discovery_feed");
        feed.finalize(FeedStatus::Degraded, serde_json::to_value(policy).ok());
        return feed;
    }

    for candidate in &upstream.entries {
        let age_minutes = candidate.age_minutes_at(now);
        let metrics = &candidate.metrics;

        if age_minutes < policy.min_age_minutes {
            feed.reject("too_young");
            continue;
        }
        if age_minutes > policy.max_age_minutes {
            let widened = metrics.liquidity_usd >= policy.exception_liquidity_floor_usd
                && age_minutes <= policy.exception_max_age_minutes;
            if !widened {
                feed.reject("too_old");
                continue;
            }
        }

        if metrics.liquidity_usd < policy.min_liquidity_usd {
            feed.reject("low_liquidity");
            continue;
        }
        if metrics.volume_1h_usd < policy.min_volume_1h_usd {
            feed.reject("low_volume");
            continue;
        }
        // either window satisfies the activity requirement
        let active = metrics.txns_15m >= policy.min_txns_15m || metrics.txns_1h >= policy.min_txns_1h;
        if !active {
            feed.reject("low_activity");
            continue;
        }

        let previous_liquidity = registry.previous_liquidity(&candidate.token.address);
        let (risk_score, risk_factors) = assess_rug_risk(candidate, previous_liquidity, config);

        // disqualifying findings, regardless of how well the pool scores
        if risk_factors.contains(&RiskFactor::LiquidityDropping) {
            feed.reject("liquidity_dropping");
            continue;
        }
        if risk_factors.contains(&RiskFactor::WashTrading) {
            feed.reject("wash_trading");
            continue;
        }

        let risk_level = risk_level(risk_score, config);
        let mut opportunity_score = opportunity_score(candidate, config);
        if risk_level == RiskLevel::Low {
            opportunity_score += policy.score.low_risk_bonus;
        }
        let net_score = opportunity_score - risk_score * policy.score.risk_penalty;

        let mut entry = OpportunityEntry {
            candidate: candidate.clone(),
            opportunity_score,
            risk_score,
            net_score,
            risk_level,
            risk_factors,
        };
        entry.candidate.status = PipelineStatus::Opportunity;
        entry.candidate.age_minutes = age_minutes;
        feed.entries.push(entry);
    }

    feed.entries.sort_by(|a, b| {
        b.net_score
            .partial_cmp(&a.net_score)
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

/// Weighted opportunity score: txn density, liquidity, volume, short trend
fn opportunity_score(candidate: &Candidate, config: &Config) -> f64 {
    let weights = &config.opportunity.score;
    let metrics = &candidate.metrics;
    let mut score = 0.0;

    score += (metrics.txns_1h as f64 / weights.txn_norm).min(1.0) * weights.txn_weight;

    if metrics.liquidity_usd > 1.0 {
        score += (metrics.liquidity_usd.log10() / weights.liquidity_log_divisor).min(1.0)
            * weights.liquidity_weight;
    }
    if metrics.volume_1h_usd > 1.0 {
        score += (metrics.volume_1h_usd.log10() / weights.volume_log_divisor).min(1.0)
            * weights.volume_weight;
    }

    let trend = metrics.price_change_5m_pct.unwrap_or(0.0);
    let span = weights.trend_span_pct;
    score += ((trend + span) / (2.0 * span)).clamp(0.0, 1.0) * weights.trend_weight;

    score
}

/// Rug-risk heuristics, independent of the opportunity score
fn assess_rug_risk(
    candidate: &Candidate,
    previous_liquidity: Option<f64>,
    config: &Config,
) -> (f64, Vec<RiskFactor>) {
    let policy = &config.opportunity.risk;
    let metrics = &candidate.metrics;
    let mut score = 0.0;
    let mut factors = Vec::new();

    if metrics.liquidity_usd < policy.low_liquidity_floor_usd {
        factors.push(RiskFactor::LowLiquidity);
        score += policy.low_liquidity_score;
    }

    let buys = metrics.buys_1h as f64;
    let sells = metrics.sells_1h as f64;
    if buys > 0.0 && sells / buys > policy.max_sell_buy_ratio {
        factors.push(RiskFactor::SellPressure);
        score += policy.sell_pressure_score;
    } else if sells > buys {
        factors.push(RiskFactor::MoreSells);
        score += policy.more_sells_score;
    }

    if let Some(prev) = previous_liquidity {
        if prev > 0.0 {
            let drop = (prev - metrics.liquidity_usd) / prev;
            if drop > policy.liquidity_drop_fraction {
                factors.push(RiskFactor::LiquidityDropping);
                score += policy.liquidity_drop_score;
            }
        }
    }

    // high turnover with implausibly few trades
    if metrics.volume_1h_usd > policy.wash_volume_floor_usd && metrics.txns_1h < policy.wash_max_txns
    {
        factors.push(RiskFactor::WashTrading);
        score += policy.wash_score;
    }

    (score, factors)
}

fn risk_level(score: f64, config: &Config) -> RiskLevel {
    let policy = &config.opportunity.risk;
    if score >= policy.high_cutoff {
        RiskLevel::High
    } else if score >= policy.medium_cutoff {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

// =============================================================================
// TESTS
// =============================================================================
