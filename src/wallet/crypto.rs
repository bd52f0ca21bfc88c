//! Hashing, base58check and P-256 ECDSA primitives.

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::types::{KazeError, KazeResult};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Double SHA-256.
pub fn hash256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// RIPEMD-160 over SHA-256.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(sha256(data)).into()
}

pub fn base58check_encode(payload: &[u8]) -> String {
    let checksum = hash256(payload);
    let mut data = payload.to_vec();
    data.extend_from_slice(&checksum[..4]);
    bs58::encode(data).into_string()
}

/// Decode and strip the 4-byte checksum.
pub fn base58check_decode(encoded: &str) -> KazeResult<Vec<u8>> {
    let data = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| KazeError::InvalidAddress(format!("base58 decode of '{}': {}", encoded, e)))?;
    if data.len() < 4 {
        return Err(KazeError::InvalidAddress(format!("'{}' is too short", encoded)));
    }
    let (payload, checksum) = data.split_at(data.len() - 4);
    if hash256(payload)[..4] != *checksum {
        return Err(KazeError::InvalidAddress(format!("checksum mismatch in '{}'", encoded)));
    }
    Ok(payload.to_vec())
}

/// Deterministic (RFC 6979) P-256 signature over SHA-256(message), as r ‖ s.
pub fn sign_message(message: &[u8], key: &SigningKey) -> [u8; 64] {
    let signature: Signature = key.sign(message);
    let mut out = [0u8; 64];
    out.copy_from_slice(&signature.to_bytes());
    out
}

/// Verify an r ‖ s signature against SEC1-encoded public key bytes.
pub fn verify_signature(message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    let Ok(key) = VerifyingKey::from_sec1_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(message, &signature).is_ok()
}
