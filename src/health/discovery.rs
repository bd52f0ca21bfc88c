//! Best-node discovery.
//!
//! # Responsibilities
//! - Reduce a provider's node list to fresh, eligible candidates
//! - Reuse the cached endpoint while it answers within the ping threshold
//! - Otherwise pick the first candidate to answer a liveness ping

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::config::KazeConfig;
use crate::health::race::race_to_success;
use crate::net::Transport;
use crate::observability::metrics;
use crate::provider::{NodeInfo, ProviderKind};
use crate::resilience::with_timeout;
use crate::rpc::RpcClient;
use crate::types::{KazeError, KazeResult};

/// Last chosen RPC endpoint per provider and network.
#[derive(Debug, Clone, Default)]
pub struct EndpointCache {
    inner: Arc<DashMap<(ProviderKind, String), String>>,
}

impl EndpointCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, provider: ProviderKind, net: &str) -> Option<String> {
        self.inner.get(&(provider, net.to_string())).map(|url| url.value().clone())
    }

    pub fn insert(&self, provider: ProviderKind, net: &str, url: String) {
        self.inner.insert((provider, net.to_string()), url);
    }

    pub fn evict(&self, provider: ProviderKind, net: &str) {
        self.inner.remove(&(provider, net.to_string()));
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryPolicy {
    pub https_only: bool,
    pub ping_timeout: Duration,
    pub ping_threshold: Duration,
}

impl DiscoveryPolicy {
    pub fn from_config(config: &KazeConfig) -> Self {
        Self {
            https_only: config.https_only,
            ping_timeout: Duration::from_millis(config.timeouts.ping_ms),
            ping_threshold: Duration::from_millis(config.timeouts.ping_ms),
        }
    }
}

/// Tallest-first candidates within one block of the tallest node.
pub fn eligible_nodes(mut nodes: Vec<NodeInfo>, https_only: bool) -> KazeResult<Vec<NodeInfo>> {
    nodes.sort_by(|a, b| b.height.cmp(&a.height));
    if https_only {
        nodes.retain(|n| n.url.starts_with("https://"));
    }
    let tallest = match nodes.first() {
        Some(node) => node.height,
        None => return Err(KazeError::NoEligibleNodes("provider listed no usable node".into())),
    };
    let threshold = tallest.saturating_sub(1);
    nodes.retain(|n| n.height >= threshold);
    Ok(nodes)
}

pub async fn discover<T: Transport>(
    transport: &T,
    cache: &EndpointCache,
    policy: &DiscoveryPolicy,
    provider: ProviderKind,
    net: &str,
    nodes: Vec<NodeInfo>,
) -> KazeResult<String> {
    let candidates = eligible_nodes(nodes, policy.https_only)?;

    if let Some(cached) = cache.get(provider, net) {
        if candidates.iter().any(|n| n.url == cached) {
            let rpc = RpcClient::new(transport, cached.as_str());
            match with_timeout(policy.ping_timeout, rpc.ping()).await {
                Ok(latency) if latency <= policy.ping_threshold => {
                    tracing::debug!(%provider, net, url = %cached, "Reusing cached endpoint");
                    return Ok(cached);
                }
                Ok(latency) => {
                    tracing::info!(%provider, net, url = %cached, latency_ms = latency.as_millis() as u64, "Cached endpoint too slow, rediscovering");
                }
                Err(e) => {
                    tracing::warn!(%provider, net, url = %cached, error = %e, "Cached endpoint failed ping, rediscovering");
                }
            }
            cache.evict(provider, net);
        }
    }

    let pings = candidates.iter().map(move |node| {
        let url = node.url.clone();
        async move {
            let rpc = RpcClient::new(transport, url.as_str());
            let latency = with_timeout(policy.ping_timeout, rpc.ping()).await?;
            Ok::<_, KazeError>((url, latency))
        }
    });

    match race_to_success(pings).await {
        Ok((url, latency)) => {
            metrics::record_discovery_latency(provider, latency);
            tracing::info!(%provider, net, url = %url, latency_ms = latency.as_millis() as u64, "Selected RPC endpoint");
            cache.insert(provider, net, url.clone());
            Ok(url)
        }
        Err(errors) => {
            tracing::warn!(%provider, net, candidates = candidates.len(), "No candidate answered a liveness ping");
            let last = errors.last().map(ToString::to_string).unwrap_or_default();
            Err(KazeError::NoEligibleNodes(format!(
                "none of {} candidates answered ({})",
                candidates.len(),
                last
            )))
        }
    }
}
