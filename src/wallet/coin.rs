//! Coins and the per-asset ledger that tracks their state.

use serde::{Deserialize, Serialize};

use crate::tx::types::CoinReference;
use crate::types::{Hash256, KazeResult, ScriptHash};
use crate::wallet::fixed8::Fixed8;

/// An observed transaction output. Identity is `(txid, index)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub index: u16,
    pub txid: Hash256,
    pub value: Fixed8,
    pub script_hash: ScriptHash,
}

impl Coin {
    pub fn reference(&self) -> CoinReference {
        CoinReference { prev_hash: self.txid, prev_index: self.index }
    }

    pub fn is(&self, reference: &CoinReference) -> bool {
        self.txid == reference.prev_hash && self.index == reference.prev_index
    }
}

/// Coin sets for one asset of one address.
///
/// A coin lives in exactly one of `unspent`, `spent` or `unconfirmed`.
/// `balance` follows the unspent set except when the ledger was hydrated
/// from a bare amount with no coin list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLedger {
    pub balance: Fixed8,
    pub unspent: Vec<Coin>,
    pub spent: Vec<Coin>,
    pub unconfirmed: Vec<Coin>,
}

impl AssetLedger {
    /// Fails with `InvalidAmount` when the coin values overflow.
    pub fn new(balance: Option<Fixed8>, unspent: Vec<Coin>) -> KazeResult<Self> {
        let total = Fixed8::try_sum(unspent.iter().map(|c| c.value), "unspent total")?;
        Ok(Self {
            balance: balance.unwrap_or(total),
            unspent,
            spent: Vec::new(),
            unconfirmed: Vec::new(),
        })
    }

    pub fn available(&self) -> Fixed8 {
        self.unspent.iter().map(|c| c.value).sum()
    }

    pub fn contains(&self, reference: &CoinReference) -> bool {
        self.unspent.iter().chain(&self.spent).chain(&self.unconfirmed).any(|c| c.is(reference))
    }

    /// Move an unspent coin to `spent`. Returns false if it was not unspent.
    pub(crate) fn spend(&mut self, reference: &CoinReference) -> bool {
        match self.unspent.iter().position(|c| c.is(reference)) {
            Some(pos) => {
                let coin = self.unspent.remove(pos);
                self.spent.push(coin);
                self.refresh();
                true
            }
            None => false,
        }
    }

    pub(crate) fn receive(&mut self, coin: Coin, confirmed: bool) {
        if confirmed {
            let reference = coin.reference();
            self.unconfirmed.retain(|c| !c.is(&reference));
            self.unspent.retain(|c| !c.is(&reference));
            self.unspent.push(coin);
            self.refresh();
        } else if !self.contains(&coin.reference()) {
            self.unconfirmed.push(coin);
        }
    }

    pub(crate) fn confirm(&mut self) {
        self.unspent.append(&mut self.unconfirmed);
        self.refresh();
    }

    pub(crate) fn refresh(&mut self) {
        self.balance = self.available();
    }
}
