//! kryptonDB `/v2/` adapter.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::config::KazeConfig;
use crate::health::discovery::EndpointCache;
use crate::net::Transport;
use crate::provider::{Height, NodeInfo, PastTransaction, Provider, ProviderContext, ProviderKind};
use crate::types::{Hash256, KazeError, KazeResult, KAZE, STREAM};
use crate::wallet::balance::{AssetInit, Balance};
use crate::wallet::claims::{ClaimRecord, Claims};
use crate::wallet::coin::Coin;
use crate::wallet::fixed8::Fixed8;

/// Every key besides `address` and `net` is an asset symbol.
#[derive(Debug, Deserialize)]
struct BalanceBody {
    address: String,
    #[serde(flatten)]
    assets: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct AssetEntry {
    balance: Fixed8,
    #[serde(default)]
    unspent: Vec<UnspentEntry>,
}

#[derive(Debug, Deserialize)]
struct UnspentEntry {
    index: u16,
    txid: Hash256,
    value: Fixed8,
}

#[derive(Debug, Deserialize)]
struct ClaimsBody {
    address: String,
    #[serde(default)]
    claims: Vec<ClaimEntry>,
    #[serde(default)]
    total_claim: i64,
    #[serde(default)]
    total_unspent_claim: i64,
}

/// `claim` is reported in raw 10^-8 units, `value` in whole units.
#[derive(Debug, Deserialize)]
struct ClaimEntry {
    claim: i64,
    index: u16,
    txid: Hash256,
    start: u32,
    end: u32,
    value: Fixed8,
}

#[derive(Debug, Deserialize)]
struct NodesBody {
    nodes: Vec<NodeEntry>,
}

#[derive(Debug, Deserialize)]
struct NodeEntry {
    url: String,
    #[serde(default)]
    status: bool,
    block_height: Height,
}

#[derive(Debug, Deserialize)]
struct HistoryBody {
    history: Vec<HistoryEntry>,
}

#[derive(Debug, Deserialize)]
struct HistoryEntry {
    #[serde(rename = "KAZE", default)]
    kaze: Option<Fixed8>,
    #[serde(rename = "STREAM", default)]
    stream: Option<Fixed8>,
    block_index: Height,
    txid: Hash256,
}

#[derive(Debug, Deserialize)]
struct HeightBody {
    block_height: Height,
}

/// Client for the kryptonDB light wallet database API.
#[derive(Debug, Clone)]
pub struct KryptonDb<T> {
    ctx: ProviderContext<T>,
}

impl<T: Transport> KryptonDb<T> {
    pub fn new(transport: T, config: Arc<KazeConfig>, endpoints: EndpointCache) -> Self {
        Self { ctx: ProviderContext { transport, config, endpoints } }
    }

    fn url(&self, net: &str, path: &str) -> KazeResult<String> {
        Ok(format!("{}/v2/{}", self.resolve_endpoint(net)?, path))
    }

    async fn claims_body(&self, net: &str, address: &str) -> KazeResult<ClaimsBody> {
        self.ctx.get(&self.url(net, &format!("address/claims/{}", address))?).await
    }
}

impl<T: Transport> Provider for KryptonDb<T> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::KryptonDb
    }

    fn resolve_endpoint(&self, net: &str) -> KazeResult<String> {
        self.ctx.resolve(ProviderKind::KryptonDb, net)
    }

    async fn fetch_nodes(&self, net: &str) -> KazeResult<Vec<NodeInfo>> {
        let body: NodesBody = self.ctx.get(&self.url(net, "network/nodes")?).await?;
        let mut nodes = Vec::new();
        for entry in body.nodes.into_iter().filter(|n| n.status) {
            nodes.push(NodeInfo { url: entry.url, height: entry.block_height.value()? });
        }
        Ok(nodes)
    }

    async fn discover_best_node(&self, net: &str) -> KazeResult<String> {
        let nodes = self.fetch_nodes(net).await?;
        self.ctx.discover(ProviderKind::KryptonDb, net, nodes).await
    }

    async fn get_balance(&self, net: &str, address: &str) -> KazeResult<Balance> {
        let body: BalanceBody = self.ctx.get(&self.url(net, &format!("address/balance/{}", address))?).await?;
        let mut balance = Balance::new(&body.address, net)?;
        let me = balance.script_hash();
        for (symbol, raw) in body.assets {
            if symbol == "net" {
                continue;
            }
            let entry: AssetEntry = serde_json::from_value(raw)
                .map_err(|e| KazeError::UnexpectedResponse(format!("asset {}: {}", symbol, e)))?;
            let unspent = entry
                .unspent
                .into_iter()
                .map(|u| Coin { index: u.index, txid: u.txid, value: u.value, script_hash: me })
                .collect();
            balance.add_asset(&symbol, AssetInit { balance: Some(entry.balance), unspent })?;
        }
        tracing::info!(provider = "kryptonDB", net, address, "Retrieved balance");
        Ok(balance)
    }

    async fn get_claims(&self, net: &str, address: &str) -> KazeResult<Claims> {
        let body = self.claims_body(net, address).await?;
        let records = body
            .claims
            .into_iter()
            .map(|c| ClaimRecord {
                index: c.index,
                txid: c.txid,
                start: c.start,
                end: c.end,
                claim: Fixed8::from_raw(c.claim),
                value: c.value,
            })
            .collect();
        tracing::info!(provider = "kryptonDB", net, address, "Retrieved claims");
        Ok(Claims::new(&body.address, net, records))
    }

    async fn get_max_claimable(&self, net: &str, address: &str) -> KazeResult<Fixed8> {
        let body = self.claims_body(net, address).await?;
        let total = body
            .total_claim
            .checked_add(body.total_unspent_claim)
            .ok_or_else(|| KazeError::UnexpectedResponse("claim totals overflow".into()))?;
        tracing::info!(provider = "kryptonDB", net, address, "Retrieved maximum claimable stream");
        Ok(Fixed8::from_raw(total))
    }

    async fn get_history(&self, net: &str, address: &str) -> KazeResult<Vec<PastTransaction>> {
        let body: HistoryBody = self.ctx.get(&self.url(net, &format!("address/history/{}", address))?).await?;
        let mut history = Vec::with_capacity(body.history.len());
        for entry in body.history {
            let change = BTreeMap::from([
                (KAZE.to_string(), entry.kaze.unwrap_or(Fixed8::ZERO)),
                (STREAM.to_string(), entry.stream.unwrap_or(Fixed8::ZERO)),
            ]);
            history.push(PastTransaction {
                txid: entry.txid,
                block_height: entry.block_index.value()?,
                change,
            });
        }
        tracing::info!(provider = "kryptonDB", net, address, count = history.len(), "Retrieved history");
        Ok(history)
    }

    async fn get_ledger_height(&self, net: &str) -> KazeResult<u64> {
        let body: HeightBody = self.ctx.get(&self.url(net, "block/height")?).await?;
        body.block_height.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::net::transport::testing::StaticTransport;
    use serde_json::json;

    const API: &str = "http://krypton.test";
    const ADDRESS: &str = "KC74MjETUTAc5qv3fqL1UiyP9DRqeQgWSR";
    const TXID: &str = "7cbcfeadb16699abdf166ecd2b47ec73db3d036fd505e3da89b9bbd51adf4070";

    fn provider(transport: &StaticTransport) -> KryptonDb<&StaticTransport> {
        KryptonDb::new(transport, Arc::new(KazeConfig::default()), EndpointCache::default())
    }

    #[tokio::test]
    async fn test_balance_keys_are_symbols() {
        let transport = StaticTransport::new();
        transport.on_get(
            &format!("{}/v2/address/balance/{}", API, ADDRESS),
            json!({
                "address": ADDRESS,
                "net": "TestNet",
                "KAZE": {"balance": 261, "unspent": [{"index": 0, "txid": TXID, "value": 261}]},
                "STREAM": {"balance": "0.5", "unspent": []}
            }),
        );

        let balance = provider(&transport).get_balance(API, ADDRESS).await.unwrap();
        assert_eq!(balance.asset_symbols().collect::<Vec<_>>(), vec![KAZE, STREAM]);
        assert_eq!(balance.asset(KAZE).unwrap().unspent[0].value, Fixed8::from_units(261).unwrap());
        assert_eq!(balance.asset(STREAM).unwrap().balance.raw(), 50_000_000);
    }

    #[tokio::test]
    async fn test_claim_amounts_are_raw_units() {
        let transport = StaticTransport::new();
        transport.on_get(
            &format!("{}/v2/address/claims/{}", API, ADDRESS),
            json!({
                "address": ADDRESS,
                "net": "TestNet",
                "claims": [{"claim": 208, "index": 0, "txid": TXID, "start": 1, "end": 9, "value": 5}],
                "total_claim": 208,
                "total_unspent_claim": 1000
            }),
        );

        let krypton = provider(&transport);
        let claims = krypton.get_claims(API, ADDRESS).await.unwrap();
        assert_eq!(claims.records[0].claim, Fixed8::from_raw(208));
        assert_eq!(claims.records[0].end, 9);
        assert_eq!(claims.total_claimable().unwrap(), Fixed8::from_raw(208));
        assert_eq!(krypton.get_max_claimable(API, ADDRESS).await.unwrap(), Fixed8::from_raw(1208));
    }

    #[tokio::test]
    async fn test_nodes_filtered_by_status() {
        let transport = StaticTransport::new();
        transport.on_get(
            &format!("{}/v2/network/nodes", API),
            json!({"nodes": [
                {"url": "https://up", "status": true, "block_height": 100},
                {"url": "https://down", "status": false, "block_height": 101}
            ]}),
        );
        let nodes = provider(&transport).fetch_nodes(API).await.unwrap();
        assert_eq!(nodes, vec![NodeInfo { url: "https://up".into(), height: 100 }]);
    }

    #[tokio::test]
    async fn test_history_defaults_missing_assets() {
        let transport = StaticTransport::new();
        transport.on_get(
            &format!("{}/v2/address/history/{}", API, ADDRESS),
            json!({"history": [{"KAZE": 5, "block_index": 42, "txid": TXID}]}),
        );
        let history = provider(&transport).get_history(API, ADDRESS).await.unwrap();
        assert_eq!(history[0].change[KAZE], Fixed8::from_units(5).unwrap());
        assert!(history[0].change[STREAM].is_zero());
        assert_eq!(history[0].block_height, 42);
    }

    #[tokio::test]
    async fn test_height_from_string() {
        let transport = StaticTransport::new();
        transport.on_get(&format!("{}/v2/block/height", API), json!({"block_height": "850"}));
        assert_eq!(provider(&transport).get_ledger_height(API).await.unwrap(), 850);
    }

    #[tokio::test]
    async fn test_named_network_uses_configured_endpoint() {
        let mut config = KazeConfig::default();
        config.networks.insert(
            "PrivNet".into(),
            NetworkConfig { krypton_db: Some(format!("{}/", API)), ..Default::default() },
        );
        let transport = StaticTransport::new();
        transport.on_get(&format!("{}/v2/block/height", API), json!({"block_height": 7}));
        let krypton = KryptonDb::new(&transport, Arc::new(config), EndpointCache::default());
        assert_eq!(krypton.get_ledger_height("PrivNet").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let transport = StaticTransport::new();
        transport.fail(&format!("{}/v2/block/height", API), "connection refused");
        let err = provider(&transport).get_ledger_height(API).await.unwrap_err();
        assert!(matches!(err, KazeError::Transport(_)));
    }
}
