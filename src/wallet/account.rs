//! Keys and accounts.
//!
//! Derivation runs one way:
//! `private key → public key → verification script → script hash → address`.
//! An account built from a later point in the chain cannot answer for an
//! earlier one and reports `KeyUnavailable` instead.

use std::fmt;

use p256::ecdsa::{SigningKey, VerifyingKey};

use crate::tx::script;
use crate::types::{KazeError, KazeResult, ScriptHash};
use crate::wallet::crypto;

/// Address version byte.
pub const ADDRESS_VERSION: u8 = 0x2d;

/// WIF version byte.
pub const WIF_VERSION: u8 = 0x80;

/// Upper bound on multisig participants.
pub const MAX_MULTISIG_KEYS: usize = 1024;

/// A P-256 private key.
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    pub fn from_bytes(bytes: &[u8]) -> KazeResult<Self> {
        SigningKey::from_slice(bytes)
            .map(Self)
            .map_err(|e| KazeError::InvalidKey(format!("invalid private key: {}", e)))
    }

    pub fn from_hex(s: &str) -> KazeResult<Self> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
            .map_err(|e| KazeError::InvalidKey(format!("invalid private key hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Decode a compressed-form WIF string.
    pub fn from_wif(wif: &str) -> KazeResult<Self> {
        let payload = crypto::base58check_decode(wif)
            .map_err(|_| KazeError::InvalidKey("WIF checksum or encoding invalid".to_string()))?;
        if payload.len() != 34 || payload[0] != WIF_VERSION || payload[33] != 0x01 {
            return Err(KazeError::InvalidKey("WIF has unexpected version or length".to_string()));
        }
        Self::from_bytes(&payload[1..33])
    }

    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self(SigningKey::random(&mut rand::rngs::OsRng))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.0.to_bytes());
        out
    }

    pub fn to_wif(&self) -> String {
        let mut payload = Vec::with_capacity(34);
        payload.push(WIF_VERSION);
        payload.extend_from_slice(&self.to_bytes());
        payload.push(0x01);
        crypto::base58check_encode(&payload)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(*self.0.verifying_key())
    }

    /// Sign an arbitrary message (SHA-256 is applied internally).
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        crypto::sign_message(message, &self.0)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// A P-256 public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Accepts compressed (33 bytes) or uncompressed (65 bytes) SEC1 encodings.
    pub fn from_bytes(bytes: &[u8]) -> KazeResult<Self> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| KazeError::InvalidKey("invalid public key encoding".to_string()))
    }

    pub fn from_hex(s: &str) -> KazeResult<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| KazeError::InvalidKey(format!("invalid public key hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_compressed(&self) -> [u8; 33] {
        let point = self.0.to_encoded_point(true);
        let mut out = [0u8; 33];
        out.copy_from_slice(point.as_bytes());
        out
    }

    pub fn to_uncompressed(&self) -> [u8; 65] {
        let point = self.0.to_encoded_point(false);
        let mut out = [0u8; 65];
        out.copy_from_slice(point.as_bytes());
        out
    }

    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        crypto::verify_signature(message, signature, &self.to_compressed())
    }

    pub fn verification_script(&self) -> Vec<u8> {
        script::single_sig_verification_script(self)
    }

    pub fn script_hash(&self) -> ScriptHash {
        ScriptHash::from_script(&self.verification_script())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_compressed()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_compressed()))
    }
}

pub fn address_from_script_hash(script_hash: &ScriptHash) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(ADDRESS_VERSION);
    payload.extend_from_slice(script_hash.as_le_bytes());
    crypto::base58check_encode(&payload)
}

pub fn script_hash_from_address(address: &str) -> KazeResult<ScriptHash> {
    let payload = crypto::base58check_decode(address)?;
    if payload.len() != 21 || payload[0] != ADDRESS_VERSION {
        return Err(KazeError::InvalidAddress(format!(
            "'{}' is not a version {:#04x} address",
            address, ADDRESS_VERSION
        )));
    }
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&payload[1..]);
    Ok(ScriptHash::from_le_bytes(bytes))
}

pub fn is_address(s: &str) -> bool {
    script_hash_from_address(s).is_ok()
}

/// `m`-of-`n` multi-signature contract over ordered public keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiSig {
    threshold: usize,
    public_keys: Vec<PublicKey>,
}

impl MultiSig {
    /// Keys are used in the order given; sort them beforehand for a canonical script.
    pub fn new(threshold: usize, public_keys: Vec<PublicKey>) -> KazeResult<Self> {
        if public_keys.is_empty() || public_keys.len() > MAX_MULTISIG_KEYS {
            return Err(KazeError::InvalidKey(format!(
                "multisig needs 1..={} keys, got {}",
                MAX_MULTISIG_KEYS,
                public_keys.len()
            )));
        }
        if threshold == 0 || threshold > public_keys.len() {
            return Err(KazeError::InvalidKey(format!(
                "multisig threshold {} out of range for {} keys",
                threshold,
                public_keys.len()
            )));
        }
        Ok(Self { threshold, public_keys })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn public_keys(&self) -> &[PublicKey] {
        &self.public_keys
    }

    pub fn verification_script(&self) -> Vec<u8> {
        script::multisig_verification_script(self.threshold, &self.public_keys)
    }

    pub fn script_hash(&self) -> ScriptHash {
        ScriptHash::from_script(&self.verification_script())
    }
}

/// An address together with whatever key material is known for it.
#[derive(Debug, Clone)]
pub struct Account {
    private_key: Option<PrivateKey>,
    public_key: Option<PublicKey>,
    multisig: Option<MultiSig>,
    script_hash: ScriptHash,
    address: String,
}

impl Account {
    pub fn from_private_key(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        let mut account = Self::from_public_key(public_key);
        account.private_key = Some(private_key);
        account
    }

    pub fn from_wif(wif: &str) -> KazeResult<Self> {
        PrivateKey::from_wif(wif).map(Self::from_private_key)
    }

    pub fn from_public_key(public_key: PublicKey) -> Self {
        let script_hash = public_key.script_hash();
        Self {
            private_key: None,
            public_key: Some(public_key),
            multisig: None,
            script_hash,
            address: address_from_script_hash(&script_hash),
        }
    }

    pub fn from_script_hash(script_hash: ScriptHash) -> Self {
        Self {
            private_key: None,
            public_key: None,
            multisig: None,
            script_hash,
            address: address_from_script_hash(&script_hash),
        }
    }

    pub fn from_address(address: &str) -> KazeResult<Self> {
        let script_hash = script_hash_from_address(address)?;
        Ok(Self {
            private_key: None,
            public_key: None,
            multisig: None,
            script_hash,
            address: address.to_string(),
        })
    }

    pub fn multisig(threshold: usize, public_keys: Vec<PublicKey>) -> KazeResult<Self> {
        let multisig = MultiSig::new(threshold, public_keys)?;
        let script_hash = multisig.script_hash();
        Ok(Self {
            private_key: None,
            public_key: None,
            multisig: Some(multisig),
            script_hash,
            address: address_from_script_hash(&script_hash),
        })
    }

    /// Build from any textual key form: WIF, private key hex, public key
    /// hex (either encoding), script hash hex, or address.
    pub fn parse(input: &str) -> KazeResult<Self> {
        let s = input.trim();
        let is_hex = s.chars().all(|c| c.is_ascii_hexdigit());
        match s.len() {
            64 if is_hex => PrivateKey::from_hex(s).map(Self::from_private_key),
            66 | 130 if is_hex => PublicKey::from_hex(s).map(Self::from_public_key),
            40 if is_hex => ScriptHash::from_be_hex(s).map(Self::from_script_hash),
            51 | 52 => Self::from_wif(s),
            _ if is_address(s) => Self::from_address(s),
            _ => Err(KazeError::InvalidKey(format!("unrecognised key format ({} chars)", s.len()))),
        }
    }

    pub fn private_key(&self) -> KazeResult<&PrivateKey> {
        self.private_key.as_ref().ok_or(KazeError::KeyUnavailable("private key"))
    }

    pub fn public_key(&self) -> KazeResult<&PublicKey> {
        self.public_key.as_ref().ok_or(KazeError::KeyUnavailable("public key"))
    }

    pub fn wif(&self) -> KazeResult<String> {
        self.private_key().map(PrivateKey::to_wif)
    }

    pub fn verification_script(&self) -> KazeResult<Vec<u8>> {
        if let Some(multisig) = &self.multisig {
            return Ok(multisig.verification_script());
        }
        self.public_key()
            .map(PublicKey::verification_script)
            .map_err(|_| KazeError::KeyUnavailable("verification script"))
    }

    pub fn script_hash(&self) -> ScriptHash {
        self.script_hash
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn multisig_contract(&self) -> Option<&MultiSig> {
        self.multisig.as_ref()
    }

    pub fn is_multisig(&self) -> bool {
        self.multisig.is_some()
    }
}
