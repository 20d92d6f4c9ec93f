//! Candidate model
//!
//! One scored (token, pool) observation flowing through the funnel. A
//! candidate is rebuilt from scratch on every discovery run (feeds are
//! full replacements, identity across runs lives only in the token
//! registry) and its score is always a pure function of the current
//! metrics snapshot and age.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snapshots::types::PairSnapshot;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenIdentity {
    pub address: String,
    pub symbol: String,
    pub name: String,
}

/// Funnel position, stamped into each stage's output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Observing,
    Buffered,
    Opportunity,
    Momentum,
    CertifiedFirst,
    CertifiedSecond,
}

impl Default for PipelineStatus {
    fn default() -> Self {
        PipelineStatus::Observing
    }
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Observing => "observing",
            PipelineStatus::Buffered => "buffered",
            PipelineStatus::Opportunity => "opportunity",
            PipelineStatus::Momentum => "momentum",
            PipelineStatus::CertifiedFirst => "certified_first",
            PipelineStatus::CertifiedSecond => "certified_second",
        }
    }
}

/// Additive, non-exclusive soft signals; rejection is decided separately
/// by hard thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTag {
    LowLiquidity,
    VeryLowLiquidity,
    LowActivity,
    LowVolume,
    Dumping,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CandidateMetrics {
    pub liquidity_usd: f64,
    pub volume_5m_usd: f64,
    pub volume_1h_usd: f64,
    pub volume_24h_usd: f64,
    pub txns_5m: u32,
    pub txns_15m: u32,
    pub txns_1h: u32,
    pub txns_24h: u32,
    pub buys_1h: u32,
    pub sells_1h: u32,
    pub price_usd: Option<f64>,
    pub price_change_5m_pct: Option<f64>,
    pub market_cap_usd: Option<f64>,
    /// Holder count when a source supplies it; the snapshot source does not
    pub holders: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateScores {
    /// Composite discovery score, clamped to [0, 100]
    pub composite: f64,
    /// 1.0 at age zero, linearly down to 0.0 at the discovery window edge
    pub freshness: f64,
    pub source: String,
    pub source_bonus: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Candidate {
    pub token: TokenIdentity,
    pub quote_token: TokenIdentity,
    pub pool_address: String,
    pub chain_id: String,
    pub dex_id: String,
    pub pair_url: Option<String>,
    pub metrics: CandidateMetrics,
    pub scores: CandidateScores,
    #[serde(default)]
    pub risk_tags: Vec<RiskTag>,
    pub status: PipelineStatus,
    /// Minutes since pool creation, or since first observation when the
    /// creation time is unknown; monotonic across repeated observations
    pub age_minutes: f64,
    pub pair_created_at: Option<DateTime<Utc>>,
    pub token_first_seen: DateTime<Utc>,
}

impl Candidate {
    /// Flatten a raw pair snapshot into a candidate shell
    ///
    /// Scores and risk tags are filled in by the discovery stage; this only
    /// carries identity and metrics over.
    pub fn from_pair(
        pair: &PairSnapshot,
        source: &str,
        source_bonus: f64,
        age_minutes: f64,
        token_first_seen: DateTime<Utc>,
    ) -> Self {
        Self {
            token: TokenIdentity {
                address: pair
                    .base_token
                    .address
                    .clone()
                    .unwrap_or_default()
                    .to_lowercase(),
                symbol: pair.base_token.symbol.clone().unwrap_or_default(),
                name: pair.base_token.name.clone().unwrap_or_default(),
            },
            quote_token: TokenIdentity {
                address: pair.quote_token.address.clone().unwrap_or_default(),
                symbol: pair.quote_token.symbol.clone().unwrap_or_default(),
                name: pair.quote_token.name.clone().unwrap_or_default(),
            },
            pool_address: pair.pair_address.to_lowercase(),
            chain_id: pair.chain_id.clone(),
            dex_id: pair.dex_id.clone(),
            pair_url: pair.url.clone(),
            metrics: CandidateMetrics {
                liquidity_usd: pair.liquidity_usd(),
                volume_5m_usd: pair.volume_m5(),
                volume_1h_usd: pair.volume_h1(),
                volume_24h_usd: pair.volume_h24(),
                txns_5m: pair.txns_m5(),
                txns_15m: pair.txns_m15(),
                txns_1h: pair.txns_h1(),
                txns_24h: pair.txns_h24(),
                buys_1h: pair.txns.h1.buys.unwrap_or(0),
                sells_1h: pair.txns.h1.sells.unwrap_or(0),
                price_usd: pair.price_usd_value(),
                price_change_5m_pct: pair.price_change.m5,
                market_cap_usd: pair.market_cap_or_fdv(),
                holders: None,
            },
            scores: CandidateScores {
                composite: 0.0,
                freshness: 0.0,
                source: source.to_string(),
                source_bonus,
            },
            risk_tags: Vec::new(),
            status: PipelineStatus::Observing,
            age_minutes,
            pair_created_at: pair
                .pair_created_at
                .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms)),
            token_first_seen,
        }
    }

    pub fn age_hours(&self) -> f64 {
        self.age_minutes / 60.0
    }

    /// Age recomputed at a later stage's run time
    ///
    /// Downstream stages read whatever discovery feed is on disk, which may
    /// be minutes old; the age gate must use the pool's clock, not the
    /// feed's. Falls back to the token's first observation when the pool
    /// creation time is unknown.
    pub fn age_minutes_at(&self, now: DateTime<Utc>) -> f64 {
        let anchor = self.pair_created_at.unwrap_or(self.token_first_seen);
        (now - anchor).num_seconds() as f64 / 60.0
    }
}
