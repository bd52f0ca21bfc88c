//! Configuration schema definitions.
//!
//! Every field has a default so an empty file is a valid configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const MAIN_NET: &str = "MainNet";
pub const TEST_NET: &str = "TestNet";

/// Root configuration for the light client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KazeConfig {
    /// Named networks and their provider/node endpoints.
    pub networks: BTreeMap<String, NetworkConfig>,

    /// Only accept `https://` nodes during discovery.
    pub https_only: bool,

    pub timeouts: TimeoutConfig,

    pub router: RouterConfig,

    pub observability: ObservabilityConfig,
}

impl Default for KazeConfig {
    fn default() -> Self {
        let mut networks = BTreeMap::new();
        networks.insert(
            MAIN_NET.to_string(),
            NetworkConfig {
                kazescan: None,
                krypton_db: None,
                nodes: vec!["http://node1.kaze.solutions:22886".to_string()],
            },
        );
        networks.insert(
            TEST_NET.to_string(),
            NetworkConfig {
                kazescan: None,
                krypton_db: None,
                nodes: vec!["http://node1.kaze.solutions:44886".to_string()],
            },
        );
        Self {
            networks,
            https_only: false,
            timeouts: TimeoutConfig::default(),
            router: RouterConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl KazeConfig {
    pub fn network(&self, net: &str) -> Option<&NetworkConfig> {
        self.networks.get(net)
    }
}

/// Endpoints of one network.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Base URL of the kazescan API.
    pub kazescan: Option<String>,

    /// Base URL of the kryptonDB API.
    pub krypton_db: Option<String>,

    /// Seed RPC nodes used when no provider is configured.
    pub nodes: Vec<String>,
}

/// Timeout configuration for network-bound operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Provider API and RPC request timeout.
    pub request_ms: u64,

    /// Liveness ping timeout during discovery.
    pub ping_ms: u64,

    /// A cached node slower than this is rediscovered.
    pub ping_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 30_000,
            ping_ms: 5_000,
            ping_ms: 2_000,
        }
    }
}

/// Access router tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Starting probability of routing to kryptonDB.
    pub initial_weight: f64,

    /// Weight shift applied after each routed call.
    pub step: f64,

    /// Start with weight nudging disabled.
    pub frozen: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            initial_weight: 0.0,
            step: 0.2,
            frozen: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: KazeConfig = toml::from_str("").unwrap();
        assert_eq!(config.timeouts.request_ms, 30_000);
        assert_eq!(config.router.step, 0.2);
        assert!(config.network(MAIN_NET).is_some());
        assert!(config.network(TEST_NET).is_some());
    }

    #[test]
    fn test_partial_network_table() {
        let config: KazeConfig = toml::from_str(
            r#"
            https_only = true

            [networks.LocalNet]
            krypton_db = "http://127.0.0.1:5000"

            [timeouts]
            ping_ms = 250
            "#,
        )
        .unwrap();
        assert!(config.https_only);
        let local = config.network("LocalNet").unwrap();
        assert_eq!(local.krypton_db.as_deref(), Some("http://127.0.0.1:5000"));
        assert!(local.kazescan.is_none());
        assert_eq!(config.timeouts.ping_ms, 250);
        assert_eq!(config.timeouts.ping_ms, 2_000);
    }
}
