//! Provider adapter subsystem.
//!
//! # Data Flow
//! ```text
//! AccessRouter picks a provider
//!     → kazescan.rs | krypton_db.rs (endpoint resolution, JSON shapes)
//!     → net::Transport (GET with timeout)
//!     → normalized Balance / Claims / NodeInfo / PastTransaction
//!
//! discover_best_node:
//!     fetch_nodes → health::discovery (filter, cache check, race)
//! ```
//!
//! # Design Decisions
//! - One trait, two implementations; the router is generic over it
//! - Every amount is converted to Fixed8 explicitly at this boundary
//! - Both providers share the process-wide endpoint cache

pub mod kazescan;
pub mod krypton_db;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;

use crate::config::KazeConfig;
use crate::health::discovery::{self, DiscoveryPolicy, EndpointCache};
use crate::net::Transport;
use crate::types::{Hash256, KazeError, KazeResult};
use crate::wallet::balance::Balance;
use crate::wallet::claims::Claims;
use crate::wallet::fixed8::Fixed8;

pub use kazescan::Kazescan;
pub use krypton_db::KryptonDb;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    Kazescan,
    KryptonDb,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Kazescan => "kazescan",
            ProviderKind::KryptonDb => "kryptonDB",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node as listed by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub url: String,
    pub height: u64,
}

/// One history entry with the net change per asset symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastTransaction {
    pub txid: Hash256,
    pub block_height: u64,
    pub change: BTreeMap<String, Fixed8>,
}

/// Capability set shared by both backend APIs.
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// API base URL for `net`. Unknown network names are taken as URLs.
    fn resolve_endpoint(&self, net: &str) -> KazeResult<String>;

    fn fetch_nodes(&self, net: &str) -> impl Future<Output = KazeResult<Vec<NodeInfo>>> + Send;

    /// Fastest fresh RPC node for `net`, reusing the cached choice while it stays healthy.
    fn discover_best_node(&self, net: &str) -> impl Future<Output = KazeResult<String>> + Send;

    fn get_balance(&self, net: &str, address: &str) -> impl Future<Output = KazeResult<Balance>> + Send;

    fn get_claims(&self, net: &str, address: &str) -> impl Future<Output = KazeResult<Claims>> + Send;

    /// Stream claimable once every coin is spent.
    fn get_max_claimable(&self, net: &str, address: &str) -> impl Future<Output = KazeResult<Fixed8>> + Send;

    fn get_history(&self, net: &str, address: &str)
        -> impl Future<Output = KazeResult<Vec<PastTransaction>>> + Send;

    fn get_ledger_height(&self, net: &str) -> impl Future<Output = KazeResult<u64>> + Send;
}

/// State both adapters carry.
#[derive(Debug, Clone)]
pub(crate) struct ProviderContext<T> {
    pub transport: T,
    pub config: Arc<KazeConfig>,
    pub endpoints: EndpointCache,
}

impl<T: Transport> ProviderContext<T> {
    pub fn resolve(&self, kind: ProviderKind, net: &str) -> KazeResult<String> {
        match self.config.network(net) {
            Some(network) => {
                let url = match kind {
                    ProviderKind::Kazescan => network.kazescan.as_ref(),
                    ProviderKind::KryptonDb => network.krypton_db.as_ref(),
                };
                url.map(|u| u.trim_end_matches('/').to_string()).ok_or_else(|| {
                    KazeError::NoEligibleNodes(format!("{} has no {} endpoint configured", net, kind))
                })
            }
            None => Ok(net.trim_end_matches('/').to_string()),
        }
    }

    pub async fn get<R: for<'de> Deserialize<'de>>(&self, url: &str) -> KazeResult<R> {
        let body = self.transport.get_json(url).await?;
        serde_json::from_value(body).map_err(|e| KazeError::UnexpectedResponse(format!("{}: {}", url, e)))
    }

    pub async fn discover(&self, kind: ProviderKind, net: &str, nodes: Vec<NodeInfo>) -> KazeResult<String> {
        let policy = DiscoveryPolicy::from_config(&self.config);
        discovery::discover(&self.transport, &self.endpoints, &policy, kind, net, nodes).await
    }
}

/// Block heights arrive as numbers or numeric strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Height {
    Number(u64),
    Text(String),
}

impl Height {
    pub fn value(&self) -> KazeResult<u64> {
        match self {
            Height::Number(n) => Ok(*n),
            Height::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| KazeError::UnexpectedResponse(format!("height '{}' is not a number", s))),
        }
    }
}

/// Ledger symbol for an asset given as hex id or symbol.
pub(crate) fn symbol_of(asset: &str) -> String {
    match Hash256::from_be_hex(asset) {
        Ok(id) => crate::types::asset_symbol(&id),
        Err(_) => asset.to_uppercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(ProviderKind::Kazescan.to_string(), "kazescan");
        assert_eq!(ProviderKind::KryptonDb.to_string(), "kryptonDB");
    }

    #[test]
    fn test_height_forms() {
        let n: Height = serde_json::from_str("1200").unwrap();
        let s: Height = serde_json::from_str("\"1201\"").unwrap();
        assert_eq!(n.value().unwrap(), 1200);
        assert_eq!(s.value().unwrap(), 1201);
        let bad: Height = serde_json::from_str("\"tip\"").unwrap();
        assert!(bad.value().is_err());
    }

    #[test]
    fn test_symbol_of() {
        assert_eq!(symbol_of(crate::types::KAZE_ASSET_ID), "KAZE");
        assert_eq!(symbol_of(&format!("0x{}", crate::types::STREAM_ASSET_ID)), "STREAM");
        assert_eq!(symbol_of("stream"), "STREAM");
    }
}
