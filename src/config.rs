//! Trawler configuration
//!
//! Every stage threshold lives here as an explicit, named policy field so
//! the funnel is inspectable and unit-testable without touching I/O. The
//! file is TOML; a default config is written on first run.
//!
//! Several windows carry a liquidity-gated widening (`exception_*` fields):
//! pools above the exception floor stay eligible up to the widened maximum
//! age. The observed deployments disagree on the exact numbers, so they are
//! configuration, not constants.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chain the funnel watches, as the snapshot source names it
    pub chain_id: String,
    /// Quote tokens a pool must trade against to be considered
    pub quote_whitelist: Vec<String>,
    /// Symbols excluded outright (established tokens relisted on new pools)
    pub bluechip_symbols: Vec<String>,
    pub http: HttpConfig,
    pub discovery: DiscoveryPolicy,
    pub buffer: BufferPolicy,
    pub opportunity: OpportunityPolicy,
    pub momentum: MomentumPolicy,
    pub certification: CertificationPolicy,
    pub outcome: OutcomePolicy,
    pub health: HealthPolicy,
    pub registry: RegistryConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    /// Max concurrent in-flight requests to the snapshot source
    pub max_concurrent_requests: usize,
}

/// Discovery stage thresholds and score weights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryPolicy {
    pub max_age_minutes: f64,
    /// Pools at or above this liquidity stay eligible past `max_age_minutes`
    pub exception_liquidity_floor_usd: f64,
    /// Widened maximum age for high-liquidity pools
    pub exception_max_age_minutes: f64,
    /// Tokens first seen longer ago than this are re-lists, never re-admitted
    pub relist_horizon_hours: f64,
    pub min_liquidity_usd: f64,
    pub min_volume_5m_usd: f64,
    /// 1h-volume fallback when the 5m window is quiet
    pub min_volume_1h_usd: f64,
    pub min_txns_5m: u32,
    pub max_candidates: usize,
    pub max_pairs_per_source: usize,
    pub score: DiscoveryScoreWeights,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryScoreWeights {
    pub base: f64,
    /// Age buckets, monotonically weaker the older the pool: up to
    /// `fresh_age_minutes` earns the fresh bonus, up to `recent_age_minutes`
    /// the recent bonus, the rest of the window the aging bonus
    pub fresh_age_minutes: f64,
    pub recent_age_minutes: f64,
    pub age_bonus_fresh: f64,
    pub age_bonus_recent: f64,
    pub age_bonus_aging: f64,
    /// Log-scale divisors: score term = min(log10(x)/divisor, 1) * weight
    pub liquidity_weight: f64,
    pub liquidity_log_divisor: f64,
    pub volume_weight: f64,
    pub volume_log_divisor: f64,
    /// Txn term = min(txns / txn_norm, 1) * txn_weight
    pub txn_weight: f64,
    pub txn_norm: f64,
}

/// Buffer stage: the 10-30 minute silent re-check window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferPolicy {
    pub min_age_minutes: f64,
    pub max_age_minutes: f64,
    pub min_liquidity_usd: f64,
    pub min_txns_5m: u32,
    /// Consecutive observations allowed before the token leaves the buffer
    pub max_checks: u32,
    /// Watch-registry entries older than this are pruned regardless of outcome
    pub retention_hours: f64,
    pub max_candidates: usize,
}

/// Opportunity stage thresholds, weights, and rug-risk policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpportunityPolicy {
    pub min_age_minutes: f64,
    pub max_age_minutes: f64,
    pub exception_liquidity_floor_usd: f64,
    pub exception_max_age_minutes: f64,
    pub min_liquidity_usd: f64,
    pub min_volume_1h_usd: f64,
    /// Activity OR-gate: either 15m or 1h txns clears the bar
    pub min_txns_15m: u32,
    pub min_txns_1h: u32,
    pub max_candidates: usize,
    pub score: OpportunityScoreWeights,
    pub risk: RugRiskPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpportunityScoreWeights {
    /// Txn density: min(txns_1h / txn_norm, 1) * txn_weight
    pub txn_weight: f64,
    pub txn_norm: f64,
    pub liquidity_weight: f64,
    pub liquidity_log_divisor: f64,
    pub volume_weight: f64,
    pub volume_log_divisor: f64,
    /// 5m price trend, mapped from [-trend_span, +trend_span] % onto [0, weight]
    pub trend_weight: f64,
    pub trend_span_pct: f64,
    /// Fraction of the risk score subtracted from the final rank
    pub risk_penalty: f64,
    /// Bonus applied when the assessed risk level is low
    pub low_risk_bonus: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RugRiskPolicy {
    pub low_liquidity_floor_usd: f64,
    pub low_liquidity_score: f64,
    pub max_sell_buy_ratio: f64,
    pub sell_pressure_score: f64,
    pub more_sells_score: f64,
    /// Liquidity decline vs. the previous registry observation; hard reject
    pub liquidity_drop_fraction: f64,
    pub liquidity_drop_score: f64,
    /// Wash trading: volume above this with txns below the floor; hard reject
    pub wash_volume_floor_usd: f64,
    pub wash_max_txns: u32,
    pub wash_score: f64,
    /// Risk level cutoffs: >= high_cutoff is high, >= medium_cutoff is medium
    pub medium_cutoff: f64,
    pub high_cutoff: f64,
}

/// Momentum stage: hours-to-a-day acceleration ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumPolicy {
    pub min_age_hours: f64,
    pub max_age_hours: f64,
    pub min_liquidity_usd: f64,
    pub min_txns_24h: u32,
    pub max_candidates: usize,
    pub score: MomentumScoreWeights,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumScoreWeights {
    pub base: f64,
    /// Bell-shaped age bonus: peak inside [peak_start, peak_end] hours,
    /// shoulder up to shoulder_end, small bonus elsewhere in the window
    pub peak_start_hours: f64,
    pub peak_end_hours: f64,
    pub shoulder_end_hours: f64,
    pub peak_bonus: f64,
    pub shoulder_bonus: f64,
    pub edge_bonus: f64,
    /// Liquidity term: min(liq / ceiling, 1) * weight
    pub liquidity_ceiling_usd: f64,
    pub liquidity_weight: f64,
    /// Volume acceleration: 1h volume above multiple * (24h volume / 24)
    pub acceleration_multiple: f64,
    pub acceleration_bonus: f64,
    pub txn_density_floor_1h: u32,
    pub txn_density_bonus: f64,
    /// Fraction of the discovery score passed through
    pub discovery_passthrough: f64,
}

/// Certification stage: two time-gated checkpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificationPolicy {
    pub first_checkpoint_hours: f64,
    pub second_checkpoint_hours: f64,
    /// Health score blend weights (liquidity / volume / txns)
    pub health_liquidity_weight: f64,
    pub health_volume_weight: f64,
    pub health_txn_weight: f64,
    pub first: CheckpointThresholds,
    pub second: CheckpointThresholds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointThresholds {
    pub min_liquidity_usd: f64,
    pub min_volume_24h_usd: f64,
    pub min_txns_24h: u32,
    /// Holder floor; only counted when holder data is available
    pub min_holders: u64,
}

/// Outcome tracker thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomePolicy {
    /// Minimum tracked age before a verdict is possible
    pub min_age_hours: f64,
    pub min_history_points: usize,
    /// G: realized gain >= G certifies, realized gain <= -G rejects
    pub gain_threshold_pct: f64,
    /// Peak gain >= peak_multiple * G also certifies
    pub peak_multiple: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthPolicy {
    /// Consecutive empty-but-valid feeds tolerated in scheduled mode
    pub max_empty_streak: u32,
    /// Feeds older than this are stale and fail hard
    pub max_feed_age_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Ring-buffer cap on per-token price/liquidity history
    pub history_cap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NotifyConfig {
    pub bot_token: String,
    pub chat_id: String,
}

// =============================================================================
// DEFAULTS
// =============================================================================

impl Default for Config {
    fn default() -> Self {
        Self {
            chain_id: "base".to_string(),
            quote_whitelist: ["USDC", "WETH", "cbBTC", "USDBC", "ETH"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            bluechip_symbols: [
                "AERO", "AERODROME", "CBBTC", "WETH", "ETH", "USDC", "USDT", "DAI", "VIRTUAL",
                "VVV", "BRETT", "DEGEN", "CLANKER", "BASE", "USDBC", "WSTETH", "CBETH", "WEETH",
                "RSR", "SNX", "UNI", "LINK", "AAVE", "CRV", "SOL", "WBTC", "BTC",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            http: HttpConfig::default(),
            discovery: DiscoveryPolicy::default(),
            buffer: BufferPolicy::default(),
            opportunity: OpportunityPolicy::default(),
            momentum: MomentumPolicy::default(),
            certification: CertificationPolicy::default(),
            outcome: OutcomePolicy::default(),
            health: HealthPolicy::default(),
            registry: RegistryConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_retries: 3,
            backoff_base_ms: 2000,
            max_concurrent_requests: 4,
        }
    }
}

impl Default for DiscoveryPolicy {
    fn default() -> Self {
        Self {
            max_age_minutes: 60.0,
            exception_liquidity_floor_usd: 10_000.0,
            exception_max_age_minutes: 120.0,
            relist_horizon_hours: 48.0,
            min_liquidity_usd: 1_000.0,
            min_volume_5m_usd: 50.0,
            min_volume_1h_usd: 500.0,
            min_txns_5m: 2,
            max_candidates: 50,
            max_pairs_per_source: 50,
            score: DiscoveryScoreWeights::default(),
        }
    }
}

impl Default for DiscoveryScoreWeights {
    fn default() -> Self {
        Self {
            base: 30.0,
            fresh_age_minutes: 15.0,
            recent_age_minutes: 30.0,
            age_bonus_fresh: 30.0,
            age_bonus_recent: 20.0,
            age_bonus_aging: 10.0,
            liquidity_weight: 20.0,
            liquidity_log_divisor: 7.0,
            volume_weight: 20.0,
            volume_log_divisor: 5.0,
            txn_weight: 10.0,
            txn_norm: 100.0,
        }
    }
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self {
            min_age_minutes: 10.0,
            max_age_minutes: 30.0,
            min_liquidity_usd: 8_000.0,
            min_txns_5m: 15,
            max_checks: 3,
            retention_hours: 2.0,
            max_candidates: 20,
        }
    }
}

impl Default for OpportunityPolicy {
    fn default() -> Self {
        Self {
            min_age_minutes: 360.0,
            max_age_minutes: 2_880.0,
            exception_liquidity_floor_usd: 10_000.0,
            exception_max_age_minutes: 4_320.0,
            min_liquidity_usd: 2_000.0,
            min_volume_1h_usd: 1_000.0,
            min_txns_15m: 5,
            min_txns_1h: 15,
            max_candidates: 20,
            score: OpportunityScoreWeights::default(),
            risk: RugRiskPolicy::default(),
        }
    }
}

impl Default for OpportunityScoreWeights {
    fn default() -> Self {
        Self {
            txn_weight: 35.0,
            txn_norm: 100.0,
            liquidity_weight: 30.0,
            liquidity_log_divisor: 5.0,
            volume_weight: 20.0,
            volume_log_divisor: 4.7,
            trend_weight: 15.0,
            trend_span_pct: 10.0,
            risk_penalty: 0.5,
            low_risk_bonus: 10.0,
        }
    }
}

impl Default for RugRiskPolicy {
    fn default() -> Self {
        Self {
            low_liquidity_floor_usd: 25_000.0,
            low_liquidity_score: 30.0,
            max_sell_buy_ratio: 1.6,
            sell_pressure_score: 40.0,
            more_sells_score: 20.0,
            liquidity_drop_fraction: 0.25,
            liquidity_drop_score: 50.0,
            wash_volume_floor_usd: 50_000.0,
            wash_max_txns: 20,
            wash_score: 35.0,
            medium_cutoff: 40.0,
            high_cutoff: 70.0,
        }
    }
}

impl Default for MomentumPolicy {
    fn default() -> Self {
        Self {
            min_age_hours: 1.0,
            max_age_hours: 24.0,
            min_liquidity_usd: 20_000.0,
            min_txns_24h: 50,
            max_candidates: 20,
            score: MomentumScoreWeights::default(),
        }
    }
}

impl Default for MomentumScoreWeights {
    fn default() -> Self {
        Self {
            base: 50.0,
            peak_start_hours: 6.0,
            peak_end_hours: 12.0,
            shoulder_end_hours: 18.0,
            peak_bonus: 25.0,
            shoulder_bonus: 15.0,
            edge_bonus: 5.0,
            liquidity_ceiling_usd: 100_000.0,
            liquidity_weight: 15.0,
            acceleration_multiple: 1.5,
            acceleration_bonus: 10.0,
            txn_density_floor_1h: 20,
            txn_density_bonus: 10.0,
            discovery_passthrough: 0.10,
        }
    }
}

impl Default for CertificationPolicy {
    fn default() -> Self {
        Self {
            first_checkpoint_hours: 48.0,
            second_checkpoint_hours: 72.0,
            health_liquidity_weight: 0.4,
            health_volume_weight: 0.35,
            health_txn_weight: 0.25,
            first: CheckpointThresholds {
                min_liquidity_usd: 30_000.0,
                min_volume_24h_usd: 20_000.0,
                min_txns_24h: 100,
                min_holders: 200,
            },
            second: CheckpointThresholds {
                min_liquidity_usd: 50_000.0,
                min_volume_24h_usd: 50_000.0,
                min_txns_24h: 200,
                min_holders: 500,
            },
        }
    }
}

impl Default for CheckpointThresholds {
    fn default() -> Self {
        CertificationPolicy::default().first
    }
}

impl Default for OutcomePolicy {
    fn default() -> Self {
        Self {
            min_age_hours: 6.0,
            min_history_points: 2,
            gain_threshold_pct: 50.0,
            peak_multiple: 2.0,
        }
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            max_empty_streak: 2,
            max_feed_age_minutes: 30,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { history_cap: 288 }
    }
}

// =============================================================================
// LOAD / SAVE
// =============================================================================

impl Config {
    /// Load the config from `path`, writing defaults on first run
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let default_config = Self::default();
            default_config.save(path)?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}
