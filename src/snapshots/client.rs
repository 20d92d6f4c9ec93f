//! Rate-limited snapshot source client
//!
//! One reqwest client shared by all source strategies, with a semaphore
//! bounding in-flight requests, a hard per-call timeout, and bounded retry
//! with exponential backoff plus jitter on rate-limit and server errors.
//! Callers treat empty and error responses as "no data", never as "zero
//! candidates"; degradation is decided by the stage, not here.

use log::{debug, warn};
use rand::Rng;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::HttpConfig;
use crate::snapshots::types::{PairSnapshot, SnapshotError, TokenRef};

const SNAPSHOT_BASE_URL: &str = "https://api.dexscreener.com";

pub struct SnapshotClient {
    client: Client,
    limiter: Arc<Semaphore>,
    timeout: Duration,
    max_retries: u32,
    backoff_base: Duration,
}

impl SnapshotClient {
    pub fn new(config: &HttpConfig) -> Self {
        let client = Client::builder()
            .user_agent("Trawler/0.1")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            limiter: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        }
    }

    /// GET a JSON document with bounded retry
    ///
    /// 429 and 5xx responses back off exponentially (with up to 2s of
    /// jitter on rate limits) and retry; other HTTP errors fail fast.
    async fn get_json(&self, url: &str) -> Result<Value, SnapshotError> {
        for attempt in 0..self.max_retries {
            let backoff = self.backoff_base * 2u32.saturating_pow(attempt);

            let permit = self.limiter.acquire().await.expect("limiter closed");
            let result = self
                .client
                .get(url)
                .header("Accept", "application/json")
                .timeout(self.timeout)
                .send()
                .await;
            drop(permit);

            let response = match result {
                Ok(r) => r,
                Err(e) => {
                    if attempt + 1 < self.max_retries {
                        warn!("[SNAPSHOTS] Request error for {url}: {e}, retrying");
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    return Err(SnapshotError::Request {
                        url: url.to_string(),
                        source: e,
                    });
                }
            };

            let status = response.status();
            if status.as_u16() == 429 {
                let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..2000));
                warn!(
                    "[SNAPSHOTS] Rate limited on {url}, retry in {:.1}s (attempt {}/{})",
                    (backoff + jitter).as_secs_f64(),
                    attempt + 1,
                    self.max_retries
                );
                tokio::time::sleep(backoff + jitter).await;
                continue;
            }

            if status.is_server_error() {
                warn!(
                    "[SNAPSHOTS] HTTP {} from {url}, retry in {:.1}s",
                    status.as_u16(),
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            if !status.is_success() {
                return Err(SnapshotError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            return response.json::<Value>().await.map_err(|e| SnapshotError::Parse {
                url: url.to_string(),
                message: e.to_string(),
            });
        }

        Err(SnapshotError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.max_retries,
        })
    }

    /// Search pairs by keyword; returns pairs across all chains
    pub async fn search_pairs(&self, query: &str) -> Result<Vec<PairSnapshot>, SnapshotError> {
        let url = format!("{SNAPSHOT_BASE_URL}/latest/dex/search?q={query}");
        let value = self.get_json(&url).await?;

        let pairs = value
            .get("pairs")
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        parse_pairs(&url, pairs)
    }

    /// All pools for one token on one chain
    pub async fn token_pools(
        &self,
        chain_id: &str,
        token_address: &str,
    ) -> Result<Vec<PairSnapshot>, SnapshotError> {
        let url = format!("{SNAPSHOT_BASE_URL}/token-pairs/v1/{chain_id}/{token_address}");
        let value = self.get_json(&url).await?;
        parse_pairs(&url, value)
    }

    /// The most liquid pool for a token, if it has any
    pub async fn best_pool(
        &self,
        chain_id: &str,
        token_address: &str,
    ) -> Result<Option<PairSnapshot>, SnapshotError> {
        let pools = self.token_pools(chain_id, token_address).await?;
        Ok(pools.into_iter().max_by(|a, b| {
            a.liquidity_usd()
                .partial_cmp(&b.liquidity_usd())
                .unwrap_or(std::cmp::Ordering::Equal)
        }))
    }

    /// Latest token profiles (newest listings)
    pub async fn latest_profiles(&self) -> Result<Vec<TokenRef>, SnapshotError> {
        self.token_refs(&format!("{SNAPSHOT_BASE_URL}/token-profiles/latest/v1"))
            .await
    }

    /// Latest boosted tokens (promotion budget as intent signal)
    pub async fn latest_boosts(&self) -> Result<Vec<TokenRef>, SnapshotError> {
        self.token_refs(&format!("{SNAPSHOT_BASE_URL}/token-boosts/latest/v1"))
            .await
    }

    /// Top boosted tokens
    pub async fn top_boosts(&self) -> Result<Vec<TokenRef>, SnapshotError> {
        self.token_refs(&format!("{SNAPSHOT_BASE_URL}/token-boosts/top/v1"))
            .await
    }

    async fn token_refs(&self, url: &str) -> Result<Vec<TokenRef>, SnapshotError> {
        let value = self.get_json(url).await?;

        // Served either as a bare array or wrapped in a data key
        let list = if value.is_array() {
            value
        } else {
            value
                .get("data")
                .cloned()
                .unwrap_or(Value::Array(Vec::new()))
        };

        debug!("[SNAPSHOTS] {url}: {} token refs", list.as_array().map_or(0, |a| a.len()));

        serde_json::from_value(list).map_err(|e| SnapshotError::Parse {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

fn parse_pairs(url: &str, value: Value) -> Result<Vec<PairSnapshot>, SnapshotError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value).map_err(|e| SnapshotError::Parse {
        url: url.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs_handles_null() {
        let pairs = parse_pairs("test", Value::Null).unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_parse_pairs_rejects_non_list() {
        let result = parse_pairs("test", Value::String("nope".into()));
        assert!(result.is_err());
    }
}
