//! Market snapshot source
//!
//! Read-only HTTP collaborator returning trading-pair snapshots. Everything
//! upstream-shaped lives here: the raw pair document, the rate-limited
//! client with retry/backoff, and the discovery source strategies.

pub mod client;
pub mod sources;
pub mod types;

pub use client::SnapshotClient;
pub use sources::{default_sources, SnapshotSource};
pub use types::{PairSnapshot, SnapshotError, TokenRef};
