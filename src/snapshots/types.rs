//! Raw snapshot-source documents
//!
//! Field names mirror the upstream API (camelCase); accessors flatten the
//! nested per-window blocks into plain numbers so stage code never touches
//! `Option` chains.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("snapshot source returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("failed to parse snapshot response from {url}: {message}")]
    Parse { url: String, message: String },

    #[error("gave up on {url} after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },
}

/// One trading-pair snapshot as served by the source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PairSnapshot {
    pub chain_id: String,
    pub dex_id: String,
    pub url: Option<String>,
    pub pair_address: String,
    pub base_token: TokenDescriptor,
    pub quote_token: TokenDescriptor,
    /// Served as a decimal string
    pub price_usd: Option<String>,
    pub txns: TxnWindows,
    pub volume: VolumeWindows,
    pub price_change: PriceChangeWindows,
    pub liquidity: LiquidityBlock,
    pub fdv: Option<f64>,
    pub market_cap: Option<f64>,
    /// Pool creation time in epoch milliseconds, when the source knows it
    pub pair_created_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub address: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TxnWindows {
    pub m5: TxnCounts,
    pub m15: TxnCounts,
    pub h1: TxnCounts,
    pub h6: TxnCounts,
    pub h24: TxnCounts,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TxnCounts {
    pub buys: Option<u32>,
    pub sells: Option<u32>,
}

impl TxnCounts {
    pub fn total(&self) -> u32 {
        self.buys.unwrap_or(0) + self.sells.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VolumeWindows {
    pub m5: Option<f64>,
    pub h1: Option<f64>,
    pub h6: Option<f64>,
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PriceChangeWindows {
    pub m5: Option<f64>,
    pub h1: Option<f64>,
    pub h6: Option<f64>,
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LiquidityBlock {
    pub usd: Option<f64>,
    pub base: Option<f64>,
    pub quote: Option<f64>,
}

impl PairSnapshot {
    pub fn liquidity_usd(&self) -> f64 {
        self.liquidity.usd.unwrap_or(0.0)
    }

    pub fn volume_m5(&self) -> f64 {
        self.volume.m5.unwrap_or(0.0)
    }

    pub fn volume_h1(&self) -> f64 {
        self.volume.h1.unwrap_or(0.0)
    }

    pub fn volume_h24(&self) -> f64 {
        self.volume.h24.unwrap_or(0.0)
    }

    pub fn txns_m5(&self) -> u32 {
        self.txns.m5.total()
    }

    pub fn txns_m15(&self) -> u32 {
        self.txns.m15.total()
    }

    pub fn txns_h1(&self) -> u32 {
        self.txns.h1.total()
    }

    pub fn txns_h24(&self) -> u32 {
        self.txns.h24.total()
    }

    pub fn price_usd_value(&self) -> Option<f64> {
        self.price_usd.as_deref().and_then(|p| p.parse().ok())
    }

    /// Market cap with FDV fallback, the way the source populates them
    pub fn market_cap_or_fdv(&self) -> Option<f64> {
        self.market_cap.or(self.fdv)
    }

    pub fn base_address(&self) -> Option<&str> {
        self.base_token.address.as_deref().filter(|a| !a.is_empty())
    }
}

/// Token reference from the profile/boost list endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenRef {
    pub chain_id: String,
    pub token_address: String,
}
