//! Chain-specific primitive types and error definitions.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::provider::ProviderKind;
use crate::wallet::crypto;
use crate::wallet::fixed8::Fixed8;

/// Asset id of the governing token.
pub const KAZE_ASSET_ID: &str = "f1fee7945e5ba7fed56272b916094ed8f384a94e63d5f8d81214dfde489ffb17";

/// Asset id of the utility token used to pay fees and claims.
pub const STREAM_ASSET_ID: &str = "09d2593e23db5e8946969a16d1980ee57e04bb25904bb0ca0d181257eb48a539";

pub const KAZE: &str = "KAZE";
pub const STREAM: &str = "STREAM";

/// 20-byte script hash, the canonical owner identifier.
///
/// Bytes are kept in wire (little-endian) order; `Display` renders the
/// conventional big-endian hex form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScriptHash([u8; 20]);

impl ScriptHash {
    pub const fn from_le_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Hash of a verification script.
    pub fn from_script(script: &[u8]) -> Self {
        Self(crypto::hash160(script))
    }

    /// Parse big-endian hex, with or without a `0x` prefix.
    pub fn from_be_hex(s: &str) -> KazeResult<Self> {
        let bytes = decode_be_hex::<20>(s)
            .ok_or_else(|| KazeError::InvalidAddress(format!("bad script hash '{}'", s)))?;
        Ok(Self(bytes))
    }

    pub fn as_le_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_be_hex(&self) -> String {
        reversed_hex(&self.0)
    }
}

impl Ord for ScriptHash {
    /// Numeric order of the 160-bit value.
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

impl PartialOrd for ScriptHash {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ScriptHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_be_hex())
    }
}

impl fmt::Debug for ScriptHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptHash({})", self.to_be_hex())
    }
}

impl FromStr for ScriptHash {
    type Err = KazeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_be_hex(s)
    }
}

/// 32-byte hash used for transaction ids and asset ids.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    pub const fn from_le_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_be_hex(s: &str) -> KazeResult<Self> {
        let bytes = decode_be_hex::<32>(s)
            .ok_or_else(|| KazeError::InvalidTransaction(format!("bad 256-bit hash '{}'", s)))?;
        Ok(Self(bytes))
    }

    pub fn as_le_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_be_hex(&self) -> String {
        reversed_hex(&self.0)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_be_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_be_hex())
    }
}

impl FromStr for Hash256 {
    type Err = KazeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_be_hex(s)
    }
}

macro_rules! hex_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_be_hex())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                <$ty>::from_be_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_serde!(ScriptHash);
hex_serde!(Hash256);

fn decode_be_hex<const N: usize>(s: &str) -> Option<[u8; N]> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let mut bytes: [u8; N] = hex::decode(s).ok()?.try_into().ok()?;
    bytes.reverse();
    Some(bytes)
}

fn reversed_hex(bytes: &[u8]) -> String {
    let mut reversed = bytes.to_vec();
    reversed.reverse();
    hex::encode(reversed)
}

/// A known asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Asset {
    pub symbol: &'static str,
    pub id: &'static str,
}

pub const ASSETS: [Asset; 2] = [
    Asset { symbol: KAZE, id: KAZE_ASSET_ID },
    Asset { symbol: STREAM, id: STREAM_ASSET_ID },
];

/// Look up an asset id by (case-insensitive) symbol.
pub fn asset_id(symbol: &str) -> Option<Hash256> {
    ASSETS
        .iter()
        .find(|a| a.symbol.eq_ignore_ascii_case(symbol))
        .and_then(|a| Hash256::from_be_hex(a.id).ok())
}

/// Ledger symbol for an asset id. Unknown ids fall back to their hex form.
pub fn asset_symbol(id: &Hash256) -> String {
    let hex = id.to_be_hex();
    ASSETS
        .iter()
        .find(|a| a.id == hex)
        .map(|a| a.symbol.to_string())
        .unwrap_or_else(|| hex.to_uppercase())
}

/// Asset id of the fee asset.
pub fn fee_asset_id() -> Hash256 {
    // Constant is well-formed; a fallback keeps this infallible.
    Hash256::from_be_hex(STREAM_ASSET_ID).unwrap_or_default()
}

/// Errors surfaced by every public operation of the crate.
#[derive(Debug, Error)]
pub enum KazeError {
    /// Coin selection could not cover an asset.
    #[error("Insufficient funds for {asset}: required {required}, available {available}")]
    InsufficientFunds {
        asset: String,
        required: Fixed8,
        available: Fixed8,
    },

    /// A claim transaction was requested without claimable records.
    #[error("No claimable stream for {address}")]
    EmptyClaims { address: String },

    /// Endpoint discovery found no usable node.
    #[error("No eligible nodes found: {0}")]
    NoEligibleNodes(String),

    /// Operation needs key material the account does not hold.
    #[error("Key unavailable: account holds no {0}")]
    KeyUnavailable(&'static str),

    /// Signer does not own the address being spent from.
    #[error("Address mismatch: signer {signer} is not a required signer (expected one of {expected})")]
    AddressMismatch { signer: String, expected: String },

    /// Wire decoding hit a truncated buffer or inconsistent length.
    #[error("Malformed wire data: {0}")]
    MalformedWire(String),

    /// A provider call failed after failover. `provider` is the fallback;
    /// `primary` is the provider tried first.
    #[error("{provider} {call} failed: {source} (after {primary} failed: {primary_error})")]
    Provider {
        provider: ProviderKind,
        call: &'static str,
        #[source]
        source: Box<KazeError>,
        primary: ProviderKind,
        primary_error: Box<KazeError>,
    },

    /// Node answered `result: false` to a submission.
    #[error("Transaction {txid} rejected by node")]
    SubmissionRejected { txid: String },

    /// HTTP transport failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Network-bound operation exceeded its deadline.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// JSON-RPC error object returned by a node.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// A pipeline step ran without a field it depends on.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Response body did not have the expected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Result type for crate operations.
pub type KazeResult<T> = Result<T, KazeError>;
