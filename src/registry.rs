//! Persistent registries
//!
//! The token registry is the only memory the funnel has across runs: it
//! carries each token's write-once first-seen timestamp (anti-relist), its
//! last-known identity, and a bounded price/liquidity history ring consumed
//! by the opportunity stage and the outcome tracker. Entries are never
//! deleted. The watch registry is the buffer stage's short-lived re-check
//! counter and is pruned aggressively.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const TOKEN_REGISTRY_SCHEMA: &str = "trawler_token_registry_v1";
pub const WATCH_REGISTRY_SCHEMA: &str = "trawler_watch_registry_v1";

// =============================================================================
// TOKEN REGISTRY
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRegistry {
    pub schema: String,
    pub tokens: BTreeMap<String, TokenRegistryEntry>,
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self {
            schema: TOKEN_REGISTRY_SCHEMA.to_string(),
            tokens: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRegistryEntry {
    /// Write-once; the anti-relist clock starts here
    pub first_seen: DateTime<Utc>,
    pub symbol: String,
    pub name: String,
    /// Bounded ring of observations, oldest first
    #[serde(default)]
    pub history: Vec<HistoryPoint>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub at: DateTime<Utc>,
    pub price_usd: f64,
    pub liquidity_usd: f64,
}

impl TokenRegistry {
    /// Record one observation of a token
    ///
    /// Inserts the entry on first sighting (first_seen = now, write-once
    /// thereafter), refreshes the display identity, appends a history point
    /// and trims the ring to `history_cap`. Called for every observed
    /// token, whether or not it is emitted as a candidate.
    pub fn observe(
        &mut self,
        address: &str,
        symbol: &str,
        name: &str,
        price_usd: Option<f64>,
        liquidity_usd: f64,
        now: DateTime<Utc>,
        history_cap: usize,
    ) {
        let key = address.to_lowercase();
        let entry = self
            .tokens
            .entry(key)
            .or_insert_with(|| TokenRegistryEntry {
                first_seen: now,
                symbol: symbol.to_string(),
                name: name.to_string(),
                history: Vec::new(),
            });

        if !symbol.is_empty() {
            entry.symbol = symbol.to_string();
        }
        if !name.is_empty() {
            entry.name = name.to_string();
        }

        entry.history.push(HistoryPoint {
            at: now,
            price_usd: price_usd.unwrap_or(0.0),
            liquidity_usd,
        });
        if entry.history.len() > history_cap {
            let excess = entry.history.len() - history_cap;
            entry.history.drain(..excess);
        }
    }

    pub fn get(&self, address: &str) -> Option<&TokenRegistryEntry> {
        self.tokens.get(&address.to_lowercase())
    }

    /// Hours since the token was first seen, if it is known at all
    pub fn age_hours(&self, address: &str, now: DateTime<Utc>) -> Option<f64> {
        self.get(address)
            .map(|e| (now - e.first_seen).num_seconds() as f64 / 3600.0)
    }

    /// Liquidity at the observation before the latest one, used for
    /// drop-detection between runs
    pub fn previous_liquidity(&self, address: &str) -> Option<f64> {
        let entry = self.get(address)?;
        if entry.history.len() < 2 {
            return None;
        }
        Some(entry.history[entry.history.len() - 2].liquidity_usd)
    }
}

// =============================================================================
// WATCH REGISTRY (buffer stage re-check counters)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchRegistry {
    pub schema: String,
    pub watching: BTreeMap<String, WatchRegistryEntry>,
}

impl Default for WatchRegistry {
    fn default() -> Self {
        Self {
            schema: WATCH_REGISTRY_SCHEMA.to_string(),
            watching: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WatchRegistryEntry {
    pub first_seen: DateTime<Utc>,
    pub checks: u32,
    pub last_check: DateTime<Utc>,
}

impl WatchRegistry {
    /// Bump the consecutive-observation counter for a token and return it
    pub fn record_check(&mut self, address: &str, now: DateTime<Utc>) -> u32 {
        let entry = self
            .watching
            .entry(address.to_lowercase())
            .and_modify(|e| {
                e.checks += 1;
                e.last_check = now;
            })
            .or_insert(WatchRegistryEntry {
                first_seen: now,
                checks: 1,
                last_check: now,
            });
        entry.checks
    }

    /// Drop entries not checked within the retention horizon, regardless of
    /// how they fared
    pub fn prune(&mut self, now: DateTime<Utc>, retention_hours: f64) {
        let cutoff = now - Duration::seconds((retention_hours * 3600.0) as i64);
        self.watching.retain(|_, e| e.last_check > cutoff);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn test_first_seen_is_write_once() {
        let mut registry = TokenRegistry::default();
        registry.observe("0xAbC", "TKN", "Token", Some(1.0), 5000.0, t(0), 10);
        registry.observe("0xabc", "TKN", "Token", Some(2.0), 6000.0, t(5), 10);

        let entry = registry.get("0xABC").unwrap();
        assert_eq!(entry.first_seen, t(0));
        assert_eq!(entry.history.len(), 2);
    }

    #[test]
    fn test_history_ring_is_bounded() {
        let mut registry = TokenRegistry::default();
        for i in 0..10 {
            registry.observe("0xabc", "TKN", "Token", Some(i as f64), 1000.0, t(i), 4);
        }

        let entry = registry.get("0xabc").unwrap();
        assert_eq!(entry.history.len(), 4);
        // oldest points were trimmed
        assert_eq!(entry.history[0].price_usd, 6.0);
        assert_eq!(entry.history[3].price_usd, 9.0);
    }

    #[test]
    fn test_age_hours() {
        let mut registry = TokenRegistry::default();
        registry.observe("0xabc", "TKN", "Token", None, 0.0, t(0), 10);
        assert_eq!(registry.age_hours("0xabc", t(12)), Some(12.0));
        assert!(registry.age_hours("0xother", t(12)).is_none());
    }

    #[test]
    fn test_previous_liquidity_needs_two_points() {
        let mut registry = TokenRegistry::default();
        registry.observe("0xabc", "TKN", "Token", None, 4000.0, t(0), 10);
        assert!(registry.previous_liquidity("0xabc").is_none());

        registry.observe("0xabc", "TKN", "Token", None, 2000.0, t(1), 10);
        assert_eq!(registry.previous_liquidity("0xabc"), Some(4000.0));
    }

    #[test]
    fn test_watch_checks_accumulate() {
        let mut watch = WatchRegistry::default();
        assert_eq!(watch.record_check("0xabc", t(0)), 1);
        assert_eq!(watch.record_check("0xabc", t(1)), 2);
        assert_eq!(watch.record_check("0xdef", t(1)), 1);
    }

    #[test]
    fn test_watch_prune_drops_stale_entries() {
        let mut watch = WatchRegistry::default();
        watch.record_check("0xold", t(0));
        watch.record_check("0xfresh", t(3));

        watch.prune(t(4), 2.0);
        assert!(!watch.watching.contains_key("0xold"));
        assert!(watch.watching.contains_key("0xfresh"));
    }
}
