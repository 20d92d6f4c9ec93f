//! Outbound notifications
//!
//! One-shot alerts for newly discovered candidates and tier upgrades,
//! deduplicated through a persisted notified-set keyed by token address.
//! A failed send removes the token from the set so the next run retries
//! it; success is the only thing that sticks.

pub mod telegram;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::candidate::Candidate;
use crate::config::Config;
use crate::feed::Feed;
use crate::paths;
use crate::store::JsonStore;
use telegram::TelegramNotifier;

pub const NOTIFIED_SCHEMA: &str = "trawler_notified_v1";

/// Alert tier, derived from score and depth at notification time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyTier {
    Watch,
    Good,
    Prime,
}

impl NotifyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyTier::Watch => "watch",
            NotifyTier::Good => "good",
            NotifyTier::Prime => "prime",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            NotifyTier::Watch => "👁",
            NotifyTier::Good => "✅",
            NotifyTier::Prime => "🔥",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifiedState {
    pub schema: String,
    pub notified: BTreeMap<String, NotifiedEntry>,
}

impl Default for NotifiedState {
    fn default() -> Self {
        Self {
            schema: NOTIFIED_SCHEMA.to_string(),
            notified: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifiedEntry {
    pub tier: NotifyTier,
    pub symbol: String,
    pub notified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgraded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub enum AlertKind {
    New,
    Upgrade { from: NotifyTier },
}

#[derive(Debug, Clone)]
pub struct PlannedAlert {
    pub kind: AlertKind,
    pub tier: NotifyTier,
    pub candidate: Candidate,
}

/// Classify a candidate into an alert tier
pub fn tier_for(candidate: &Candidate) -> NotifyTier {
    let score = candidate.scores.composite;
    let liquidity = candidate.metrics.liquidity_usd;
    let volume_1h = candidate.metrics.volume_1h_usd;

    let pumping = volume_1h > 100_000.0;
    if score >= 80.0 && (liquidity > 40_000.0 || pumping) {
        NotifyTier::Prime
    } else if score >= 60.0 || liquidity > 30_000.0 || volume_1h > 50_000.0 {
        NotifyTier::Good
    } else {
        NotifyTier::Watch
    }
}

/// Decide which alerts to send and mark them in the state
///
/// New tokens alert at whatever tier they enter with; known tokens alert
/// again only when they climb to a higher tier.
pub fn plan_alerts(
    candidates: &[Candidate],
    state: &mut NotifiedState,
    now: DateTime<Utc>,
) -> Vec<PlannedAlert> {
    let mut planned = Vec::new();

    for candidate in candidates {
        let address = candidate.token.address.to_lowercase();
        if address.is_empty() {
            continue;
        }
        let tier = tier_for(candidate);

        match state.notified.get_mut(&address) {
            None => {
                state.notified.insert(
                    address,
                    NotifiedEntry {
                        tier,
                        symbol: candidate.token.symbol.clone(),
                        notified_at: now,
                        upgraded_at: None,
                    },
                );
                planned.push(PlannedAlert {
                    kind: AlertKind::New,
                    tier,
                    candidate: candidate.clone(),
                });
            }
            Some(entry) if tier > entry.tier => {
                let from = entry.tier;
                entry.tier = tier;
                entry.upgraded_at = Some(now);
                planned.push(PlannedAlert {
                    kind: AlertKind::Upgrade { from },
                    tier,
                    candidate: candidate.clone(),
                });
            }
            Some(_) => {}
        }
    }

    planned
}

/// Forget failed sends so the next run retries them
pub fn remove_failed(state: &mut NotifiedState, failed: &[String]) {
    for address in failed {
        state.notified.remove(&address.to_lowercase());
    }
}

/// Run one notification pass over the discovery feed
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let discovery_path = paths::get_discovery_feed_path();
    if !discovery_path.exists() {
        warn!("[NOTIFY] No discovery feed to notify from");
        return Ok(());
    }
    let feed: Feed<Candidate> = JsonStore::new(&discovery_path).load();

    let state_store: JsonStore<NotifiedState> = JsonStore::new(paths::get_notified_state_path());
    let mut state = state_store.load();

    let planned = plan_alerts(&feed.entries, &mut state, Utc::now());
    info!("[NOTIFY] {} alerts to send", planned.len());

    if !planned.is_empty() {
        let notifier = TelegramNotifier::new(&config.notify.bot_token, &config.notify.chat_id)
            .map_err(|e| anyhow::anyhow!(e))?;

        let mut failed = Vec::new();
        for alert in &planned {
            let message = telegram::format_alert(alert);
            if let Err(e) = notifier.send_message(&message).await {
                warn!(
                    "[NOTIFY] Send failed for {}: {}",
                    alert.candidate.token.symbol, e
                );
                failed.push(alert.candidate.token.address.clone());
            }
        }
        remove_failed(&mut state, &failed);
    }

    state_store.save(&state)?;
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
