//! Outcome tracker: the hall of fame
//!
//! Long-horizon scorekeeping over the token registry's price history.
//! Every tracked token ends in exactly one terminal state: certified
//! (realized or peak gain cleared the bar) or rejected (drawdown past the
//! bar). Terminal lists are append-only and mutually exclusive; the
//! tracking list is rebuilt from the registry every run.

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::candidate::TokenIdentity;
use crate::config::Config;
use crate::paths;
use crate::registry::{TokenRegistry, TokenRegistryEntry};
use crate::store::JsonStore;

pub const HALL_OF_FAME_SCHEMA: &str = "trawler_hall_of_fame_v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HallOfFame {
    pub schema: String,
    pub meta: HallOfFameMeta,
    pub certified: Vec<OutcomeEntry>,
    pub tracking: Vec<OutcomeEntry>,
    pub rejected: Vec<OutcomeEntry>,
}

impl Default for HallOfFame {
    fn default() -> Self {
        Self {
            schema: HALL_OF_FAME_SCHEMA.to_string(),
            meta: HallOfFameMeta::default(),
            certified: Vec::new(),
            tracking: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HallOfFameMeta {
    pub updated_at: Option<DateTime<Utc>>,
    pub total_tracked: usize,
    pub total_certified: usize,
    /// certified / (certified + rejected), in percent
    pub win_rate_pct: f64,
    pub average_gain_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Tracking,
    Certified,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeEntry {
    pub token: TokenIdentity,
    pub first_seen: DateTime<Utc>,
    pub age_hours: f64,
    pub performance: Performance,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certified_gain_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Performance {
    pub realized_gain_pct: f64,
    pub peak_gain_pct: f64,
    pub first_price: f64,
    pub last_price: f64,
    pub peak_price: f64,
}

pub fn run(config: &Config) -> anyhow::Result<HallOfFame> {
    let registry_store: JsonStore<TokenRegistry> = JsonStore::new(paths::get_token_registry_path());
    let registry = registry_store.load();

    let hof_store: JsonStore<HallOfFame> = JsonStore::new(paths::get_hall_of_fame_path());
    let previous = hof_store.load();

    let hof = evaluate(&registry, previous, config, Utc::now());

    hof_store.save(&hof)?;

    info!(
        "[OUTCOME] {} tracking, {} certified, {} rejected, win rate {:.1}%",
        hof.tracking.len(),
        hof.certified.len(),
        hof.rejected.len(),
        hof.meta.win_rate_pct
    );

    Ok(hof)
}

pub fn evaluate(
    registry: &TokenRegistry,
    previous: HallOfFame,
    config: &Config,
    now: DateTime<Utc>,
) -> HallOfFame {
    let policy = &config.outcome;
    let mut hof = previous;
    hof.schema = HALL_OF_FAME_SCHEMA.to_string();

    // terminal states are forever; their tokens never re-enter tracking
    let terminal: HashSet<String> = hof
        .certified
        .iter()
        .chain(hof.rejected.iter())
        .map(|e| e.token.address.to_lowercase())
        .collect();

    // rebuild the tracking list from the registry
    let mut tracking: Vec<OutcomeEntry> = Vec::new();
    for (address, entry) in &registry.tokens {
        if terminal.contains(address) {
            continue;
        }

        let age_hours = (now - entry.first_seen).num_seconds() as f64 / 3600.0;
        if age_hours < policy.min_age_hours {
            continue;
        }
        if entry.history.len() < policy.min_history_points {
            continue;
        }

        let Some(performance) = performance(entry) else {
            continue;
        };

        tracking.push(OutcomeEntry {
            token: TokenIdentity {
                address: address.clone(),
                symbol: entry.symbol.clone(),
                name: entry.name.clone(),
            },
            first_seen: entry.first_seen,
            age_hours: (age_hours * 10.0).round() / 10.0,
            performance,
            status: OutcomeStatus::Tracking,
            certified_at: None,
            rejected_at: None,
            certified_gain_pct: None,
        });
    }

    // verdicts
    let threshold = policy.gain_threshold_pct;
    let mut still_tracking = Vec::new();
    for mut entry in tracking {
        let realized = entry.performance.realized_gain_pct;
        let peak = entry.performance.peak_gain_pct;

        if realized >= threshold || peak >= threshold * policy.peak_multiple {
            entry.status = OutcomeStatus::Certified;
            entry.certified_at = Some(now);
            entry.certified_gain_pct = Some(realized.max(peak / 2.0));
            hof.certified.push(entry);
        } else if realized <= -threshold {
            entry.status = OutcomeStatus::Rejected;
            entry.rejected_at = Some(now);
            hof.rejected.push(entry);
        } else {
            still_tracking.push(entry);
        }
    }
    hof.tracking = still_tracking;

    // aggregate stats
    let decided = hof.certified.len() + hof.rejected.len();
    hof.meta.total_tracked = decided + hof.tracking.len();
    hof.meta.total_certified = hof.certified.len();
    hof.meta.win_rate_pct = if decided > 0 {
        (hof.certified.len() as f64 / decided as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    };
    hof.meta.average_gain_pct = if hof.certified.is_empty() {
        0.0
    } else {
        let sum: f64 = hof
            .certified
            .iter()
            .filter_map(|e| e.certified_gain_pct)
            .sum();
        ((sum / hof.certified.len() as f64) * 10.0).round() / 10.0
    };
    hof.meta.updated_at = Some(now);

    hof
}

/// Realized and peak gain over the recorded history
///
/// Returns None when the first recorded price is unusable.
fn performance(entry: &TokenRegistryEntry) -> Option<Performance> {
    let first = entry.history.first()?.price_usd;
    let last = entry.history.last()?.price_usd;
    if first <= 0.0 {
        return None;
    }

    let peak = entry
        .history
        .iter()
        .map(|p| p.price_usd)
        .fold(f64::MIN, f64::max);

    Some(Performance {
        realized_gain_pct: (((last - first) / first) * 10_000.0).round() / 100.0,
        peak_gain_pct: (((peak - first) / first) * 10_000.0).round() / 100.0,
        first_price: first,
        last_price: last,
        peak_price: peak,
    })
}

// =============================================================================
// TESTS
// =============================================================================
