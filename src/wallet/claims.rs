//! Claimable-stream records derived from spent coins.

use serde::{Deserialize, Serialize};

use crate::tx::types::{CoinReference, Transaction, TransactionKind};
use crate::types::{Hash256, KazeResult, ScriptHash};
use crate::wallet::account::script_hash_from_address;
use crate::wallet::fixed8::Fixed8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub index: u16,
    pub txid: Hash256,
    pub start: u32,
    pub end: u32,
    /// Claimable stream accrued by the coin.
    pub claim: Fixed8,
    /// Value of the spent coin.
    pub value: Fixed8,
}

impl ClaimRecord {
    pub fn reference(&self) -> CoinReference {
        CoinReference { prev_hash: self.txid, prev_index: self.index }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub address: String,
    pub net: String,
    pub records: Vec<ClaimRecord>,
}

impl Claims {
    pub fn new(address: &str, net: &str, records: Vec<ClaimRecord>) -> Self {
        Self {
            address: address.to_string(),
            net: net.to_string(),
            records,
        }
    }

    pub fn script_hash(&self) -> KazeResult<ScriptHash> {
        script_hash_from_address(&self.address)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_claimable(&self) -> KazeResult<Fixed8> {
        Fixed8::try_sum(self.records.iter().map(|r| r.claim), "claimable total")
    }

    pub fn references(&self) -> Vec<CoinReference> {
        self.records.iter().map(ClaimRecord::reference).collect()
    }

    /// Drop the records a claim transaction consumes. Other kinds are ignored.
    pub fn apply_claim(&mut self, tx: &Transaction) {
        if let TransactionKind::Claim { claims } = &tx.kind {
            self.records.retain(|r| !claims.contains(&r.reference()));
        }
    }
}
