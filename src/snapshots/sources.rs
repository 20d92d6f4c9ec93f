//! Discovery source strategies
//!
//! Each strategy is one independent way of raking the snapshot source for
//! pairs. Discovery fans out over all of them and tolerates individual
//! failures; a strategy that errors contributes nothing to the run.

use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

use crate::config::DiscoveryPolicy;
use crate::snapshots::client::SnapshotClient;
use crate::snapshots::types::{PairSnapshot, SnapshotError};

/// Keyword queries for the broad search rake
const SEARCH_QUERIES: [&str; 3] = ["WETH", "USDC", "ETH"];

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Small additive score bonus carried by pairs from this source
    fn score_bonus(&self) -> f64;

    async fn fetch(&self) -> Result<Vec<PairSnapshot>, SnapshotError>;
}

/// Broad keyword search, filtered to the configured chain
pub struct SearchRakeSource {
    client: Arc<SnapshotClient>,
    chain_id: String,
    max_pairs: usize,
}

#[async_trait]
impl SnapshotSource for SearchRakeSource {
    fn name(&self) -> &'static str {
        "search"
    }

    fn score_bonus(&self) -> f64 {
        0.0
    }

    async fn fetch(&self) -> Result<Vec<PairSnapshot>, SnapshotError> {
        let mut pairs = Vec::new();

        for query in SEARCH_QUERIES {
            let found = self.client.search_pairs(query).await?;
            pairs.extend(
                found
                    .into_iter()
                    .filter(|p| p.chain_id.eq_ignore_ascii_case(&self.chain_id)),
            );
        }

        pairs.truncate(self.max_pairs);
        debug!("[DISCOVERY] search rake: {} pairs", pairs.len());
        Ok(pairs)
    }
}

/// Newest token profiles, resolved to their most liquid pool
pub struct ProfilesSource {
    client: Arc<SnapshotClient>,
    chain_id: String,
    max_tokens: usize,
}

#[async_trait]
impl SnapshotSource for ProfilesSource {
    fn name(&self) -> &'static str {
        "profiles"
    }

    fn score_bonus(&self) -> f64 {
        5.0
    }

    async fn fetch(&self) -> Result<Vec<PairSnapshot>, SnapshotError> {
        let refs = self.client.latest_profiles().await?;
        resolve_tokens(&self.client, &self.chain_id, refs, self.max_tokens).await
    }
}

/// Freshly boosted tokens
pub struct BoostsSource {
    client: Arc<SnapshotClient>,
    chain_id: String,
    max_tokens: usize,
}

#[async_trait]
impl SnapshotSource for BoostsSource {
    fn name(&self) -> &'static str {
        "boosts"
    }

    fn score_bonus(&self) -> f64 {
        10.0
    }

    async fn fetch(&self) -> Result<Vec<PairSnapshot>, SnapshotError> {
        let refs = self.client.latest_boosts().await?;
        resolve_tokens(&self.client, &self.chain_id, refs, self.max_tokens).await
    }
}

/// Highest-budget boosted tokens
pub struct TopBoostsSource {
    client: Arc<SnapshotClient>,
    chain_id: String,
    max_tokens: usize,
}

#[async_trait]
impl SnapshotSource for TopBoostsSource {
    fn name(&self) -> &'static str {
        "top_boosts"
    }

    fn score_bonus(&self) -> f64 {
        15.0
    }

    async fn fetch(&self) -> Result<Vec<PairSnapshot>, SnapshotError> {
        let refs = self.client.top_boosts().await?;
        resolve_tokens(&self.client, &self.chain_id, refs, self.max_tokens).await
    }
}

/// Resolve token refs on our chain to their most liquid pool
async fn resolve_tokens(
    client: &SnapshotClient,
    chain_id: &str,
    refs: Vec<crate::snapshots::types::TokenRef>,
    max_tokens: usize,
) -> Result<Vec<PairSnapshot>, SnapshotError> {
    let mut pairs = Vec::new();

    for token_ref in refs
        .into_iter()
        .filter(|r| r.chain_id.eq_ignore_ascii_case(chain_id))
        .take(max_tokens)
    {
        if token_ref.token_address.is_empty() {
            continue;
        }
        if let Some(best) = client.best_pool(chain_id, &token_ref.token_address).await? {
            pairs.push(best);
        }
    }

    Ok(pairs)
}

/// The full strategy set for a discovery run
pub fn default_sources(
    client: Arc<SnapshotClient>,
    chain_id: &str,
    policy: &DiscoveryPolicy,
) -> Vec<Box<dyn SnapshotSource>> {
    vec![
        Box::new(SearchRakeSource {
            client: Arc::clone(&client),
            chain_id: chain_id.to_string(),
            max_pairs: policy.max_pairs_per_source,
        }),
        Box::new(ProfilesSource {
            client: Arc::clone(&client),
            chain_id: chain_id.to_string(),
            max_tokens: policy.max_pairs_per_source,
        }),
        Box::new(BoostsSource {
            client: Arc::clone(&client),
            chain_id: chain_id.to_string(),
            max_tokens: policy.max_pairs_per_source,
        }),
        Box::new(TopBoostsSource {
            client,
            chain_id: chain_id.to_string(),
            max_tokens: policy.max_pairs_per_source,
        }),
    ]
}
