//! Address-scoped coin ledger across assets.

use std::collections::BTreeMap;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use crate::net::Transport;
use crate::rpc::RpcClient;
use crate::tx::types::{CoinReference, Transaction};
use crate::types::{asset_symbol, KazeResult, ScriptHash};
use crate::wallet::account::script_hash_from_address;
use crate::wallet::coin::{AssetLedger, Coin};
use crate::wallet::fixed8::Fixed8;

/// Initial contents of an asset ledger.
#[derive(Debug, Clone, Default)]
pub struct AssetInit {
    pub balance: Option<Fixed8>,
    pub unspent: Vec<Coin>,
}

/// Coin state of one address on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub address: String,
    pub net: String,
    script_hash: ScriptHash,
    assets: BTreeMap<String, AssetLedger>,
}

impl Balance {
    pub fn new(address: &str, net: &str) -> KazeResult<Self> {
        Ok(Self {
            address: address.to_string(),
            net: net.to_string(),
            script_hash: script_hash_from_address(address)?,
            assets: BTreeMap::new(),
        })
    }

    pub fn script_hash(&self) -> ScriptHash {
        self.script_hash
    }

    /// Register an asset under its upper-case symbol, replacing any previous ledger.
    pub fn add_asset(&mut self, symbol: &str, init: AssetInit) -> KazeResult<()> {
        let ledger = AssetLedger::new(init.balance, init.unspent)?;
        self.assets.insert(symbol.to_uppercase(), ledger);
        Ok(())
    }

    pub fn asset_symbols(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    pub fn asset(&self, symbol: &str) -> Option<&AssetLedger> {
        self.assets.get(&symbol.to_uppercase())
    }

    /// Owner of a tracked coin, in whichever state it sits.
    pub fn coin_owner(&self, reference: &CoinReference) -> Option<ScriptHash> {
        self.assets.values().find_map(|ledger| {
            ledger
                .unspent
                .iter()
                .chain(&ledger.spent)
                .chain(&ledger.unconfirmed)
                .find(|c| c.is(reference))
                .map(|c| c.script_hash)
        })
    }

    /// Spend inputs held in `unspent` and record outputs paid to this
    /// address. Unrelated transactions leave the balance unchanged.
    pub fn apply_transaction(&mut self, tx: &Transaction, confirmed: bool) {
        for input in &tx.inputs {
            for ledger in self.assets.values_mut() {
                if ledger.spend(input) {
                    break;
                }
            }
        }

        let txid = tx.hash();
        for (index, output) in tx.outputs.iter().enumerate() {
            if output.script_hash != self.script_hash {
                continue;
            }
            let coin = Coin {
                index: index as u16,
                txid,
                value: output.value,
                script_hash: output.script_hash,
            };
            self.assets
                .entry(asset_symbol(&output.asset_id))
                .or_default()
                .receive(coin, confirmed);
        }
    }

    /// Promote every unconfirmed coin to unspent.
    pub fn confirm(&mut self) {
        for ledger in self.assets.values_mut() {
            ledger.confirm();
        }
    }

    /// Reconcile against a node's `gettxout`: every tracked coin the node
    /// reports unspent moves to `unspent` (taking the node's value), every
    /// other one to `spent`. Any RPC failure leaves the balance untouched.
    pub async fn verify<T: Transport>(&mut self, rpc: &RpcClient<T>) -> KazeResult<()> {
        let mut coins: Vec<(String, Coin)> = Vec::new();
        for (symbol, ledger) in &self.assets {
            for coin in ledger.unspent.iter().chain(&ledger.spent) {
                coins.push((symbol.clone(), coin.clone()));
            }
        }

        let lookups = coins.iter().map(|(_, coin)| rpc.get_tx_out(&coin.txid, coin.index));
        let results = join_all(lookups).await;
        let outs = results.into_iter().collect::<KazeResult<Vec<_>>>()?;

        let mut verified: BTreeMap<String, (Vec<Coin>, Vec<Coin>)> = BTreeMap::new();
        for ((symbol, mut coin), out) in coins.into_iter().zip(outs) {
            let (unspent, spent) = verified.entry(symbol).or_default();
            match out {
                Some(out) => {
                    coin.value = out.value;
                    unspent.push(coin);
                }
                None => spent.push(coin),
            }
        }

        for (symbol, (unspent, spent)) in verified {
            if let Some(ledger) = self.assets.get_mut(&symbol) {
                ledger.unspent = unspent;
                ledger.spent = spent;
                ledger.refresh();
            }
        }
        tracing::debug!(address = %self.address, net = %self.net, "Balance verified against node");
        Ok(())
    }
}
