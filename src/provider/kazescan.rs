//! kazescan `/v1/` adapter.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::config::KazeConfig;
use crate::health::discovery::EndpointCache;
use crate::net::Transport;
use crate::provider::{symbol_of, Height, NodeInfo, PastTransaction, Provider, ProviderContext, ProviderKind};
use crate::types::{Hash256, KazeError, KazeResult, KAZE, STREAM};
use crate::wallet::balance::{AssetInit, Balance};
use crate::wallet::claims::{ClaimRecord, Claims};
use crate::wallet::coin::Coin;
use crate::wallet::fixed8::Fixed8;

#[derive(Debug, Deserialize)]
struct BalanceBody {
    address: String,
    #[serde(default)]
    balance: Option<Vec<AssetEntry>>,
}

#[derive(Debug, Deserialize)]
struct AssetEntry {
    asset: String,
    amount: Fixed8,
    #[serde(default)]
    unspent: Vec<UnspentEntry>,
}

#[derive(Debug, Deserialize)]
struct UnspentEntry {
    n: u16,
    txid: Hash256,
    value: Fixed8,
}

#[derive(Debug, Deserialize)]
struct ClaimableBody {
    address: String,
    #[serde(default)]
    claimable: Option<Vec<ClaimableEntry>>,
}

#[derive(Debug, Deserialize)]
struct ClaimableEntry {
    start_height: u32,
    end_height: u32,
    n: u16,
    unclaimed: Fixed8,
    txid: Hash256,
    value: Fixed8,
}

#[derive(Debug, Deserialize)]
struct UnclaimedBody {
    #[serde(default)]
    unclaimed: Option<Fixed8>,
}

#[derive(Debug, Deserialize)]
struct NodeEntry {
    url: String,
    height: Height,
}

#[derive(Debug, Deserialize)]
struct HeightBody {
    height: Height,
}

#[derive(Debug, Deserialize)]
struct HistoryEntry {
    txid: Hash256,
    block_height: Height,
    #[serde(default)]
    vin: Vec<Movement>,
    #[serde(default)]
    vouts: Vec<Movement>,
}

#[derive(Debug, Deserialize)]
struct Movement {
    address_hash: String,
    asset: String,
    value: Fixed8,
}

/// Client for the kazescan block explorer API.
#[derive(Debug, Clone)]
pub struct Kazescan<T> {
    ctx: ProviderContext<T>,
}

impl<T: Transport> Kazescan<T> {
    pub fn new(transport: T, config: Arc<KazeConfig>, endpoints: EndpointCache) -> Self {
        Self { ctx: ProviderContext { transport, config, endpoints } }
    }

    fn url(&self, net: &str, path: &str) -> KazeResult<String> {
        Ok(format!("{}/v1/{}", self.resolve_endpoint(net)?, path))
    }
}

impl<T: Transport> Provider for Kazescan<T> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Kazescan
    }

    fn resolve_endpoint(&self, net: &str) -> KazeResult<String> {
        self.ctx.resolve(ProviderKind::Kazescan, net)
    }

    async fn fetch_nodes(&self, net: &str) -> KazeResult<Vec<NodeInfo>> {
        let url = self.url(net, "get_all_nodes")?;
        let entries: Vec<NodeEntry> = self.ctx.get(&url).await?;
        let mut nodes = Vec::with_capacity(entries.len());
        for entry in entries {
            nodes.push(NodeInfo { url: entry.url, height: entry.height.value()? });
        }
        Ok(nodes)
    }

    async fn discover_best_node(&self, net: &str) -> KazeResult<String> {
        let nodes = self.fetch_nodes(net).await?;
        self.ctx.discover(ProviderKind::Kazescan, net, nodes).await
    }

    async fn get_balance(&self, net: &str, address: &str) -> KazeResult<Balance> {
        let body: BalanceBody = self.ctx.get(&self.url(net, &format!("get_balance/{}", address))?).await?;
        let mut balance = Balance::new(&body.address, net)?;
        let me = balance.script_hash();
        for entry in body.balance.unwrap_or_default() {
            let unspent = entry
                .unspent
                .into_iter()
                .map(|u| Coin { index: u.n, txid: u.txid, value: u.value, script_hash: me })
                .collect();
            balance.add_asset(&entry.asset, AssetInit { balance: Some(entry.amount), unspent })?;
        }
        tracing::info!(provider = "kazescan", net, address, "Retrieved balance");
        Ok(balance)
    }

    async fn get_claims(&self, net: &str, address: &str) -> KazeResult<Claims> {
        let body: ClaimableBody = self.ctx.get(&self.url(net, &format!("get_claimable/{}", address))?).await?;
        let records = body
            .claimable
            .unwrap_or_default()
            .into_iter()
            .map(|c| ClaimRecord {
                index: c.n,
                txid: c.txid,
                start: c.start_height,
                end: c.end_height,
                claim: c.unclaimed,
                value: c.value,
            })
            .collect();
        tracing::info!(provider = "kazescan", net, address, "Retrieved claims");
        Ok(Claims::new(&body.address, net, records))
    }

    async fn get_max_claimable(&self, net: &str, address: &str) -> KazeResult<Fixed8> {
        let body: UnclaimedBody = self.ctx.get(&self.url(net, &format!("get_unclaimed/{}", address))?).await?;
        tracing::info!(provider = "kazescan", net, address, "Retrieved maximum claimable stream");
        Ok(body.unclaimed.unwrap_or(Fixed8::ZERO))
    }

    async fn get_history(&self, net: &str, address: &str) -> KazeResult<Vec<PastTransaction>> {
        let path = format!("get_last_transactions_by_address/{}", address);
        let entries: Vec<HistoryEntry> = self.ctx.get(&self.url(net, &path)?).await?;
        let mut history = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut change = BTreeMap::from([(KAZE.to_string(), Fixed8::ZERO), (STREAM.to_string(), Fixed8::ZERO)]);
            let overflow = || KazeError::UnexpectedResponse(format!("history amounts of {} overflow", entry.txid));
            for out in entry.vouts.iter().filter(|m| m.address_hash == address) {
                let total = change.entry(symbol_of(&out.asset)).or_default();
                *total = total.checked_add(out.value).ok_or_else(overflow)?;
            }
            for input in entry.vin.iter().filter(|m| m.address_hash == address) {
                let total = change.entry(symbol_of(&input.asset)).or_default();
                *total = total.checked_sub(input.value).ok_or_else(overflow)?;
            }
            history.push(PastTransaction {
                txid: entry.txid,
                block_height: entry.block_height.value()?,
                change,
            });
        }
        tracing::info!(provider = "kazescan", net, address, count = history.len(), "Retrieved history");
        Ok(history)
    }

    async fn get_ledger_height(&self, net: &str) -> KazeResult<u64> {
        let body: HeightBody = self.ctx.get(&self.url(net, "get_height")?).await?;
        body.height.value()
    }
}
