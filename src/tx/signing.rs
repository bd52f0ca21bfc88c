//! Witness production: single-key, external and multi-signature.
//!
//! Every signature covers the unsigned payload (`serialize(false)`); P-256
//! ECDSA hashes it with SHA-256 internally.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::tx::script;
use crate::tx::types::{StateType, Transaction, TransactionKind, TxLifecycle, Witness};
use crate::types::{KazeError, KazeResult, ScriptHash};
use crate::wallet::account::{address_from_script_hash, MultiSig, PrivateKey, PublicKey};
use crate::wallet::balance::Balance;
use crate::wallet::claims::Claims;

/// A signer whose key lives outside this process (hardware wallet, remote service).
pub trait ExternalSigner: Send + Sync {
    fn public_key(&self) -> PublicKey;

    /// Return the 64-byte `r ‖ s` signature over `message`.
    fn sign<'a>(&'a self, message: &'a [u8]) -> BoxFuture<'a, KazeResult<[u8; 64]>>;
}

/// Signing capability supplied with a request.
#[derive(Clone)]
pub enum Signer {
    LocalKey(PrivateKey),
    External(Arc<dyn ExternalSigner>),
}

impl Signer {
    pub fn public_key(&self) -> PublicKey {
        match self {
            Signer::LocalKey(key) => key.public_key(),
            Signer::External(ext) => ext.public_key(),
        }
    }

    pub fn script_hash(&self) -> ScriptHash {
        self.public_key().script_hash()
    }

    pub async fn sign(&self, message: &[u8]) -> KazeResult<[u8; 64]> {
        match self {
            Signer::LocalKey(key) => Ok(key.sign(message)),
            Signer::External(ext) => ext.sign(message).await,
        }
    }

    /// Single-signature witness for `tx`.
    pub async fn witness(&self, tx: &Transaction) -> KazeResult<Witness> {
        let signature = self.sign(&tx.unsigned_bytes()).await?;
        Ok(Witness {
            invocation: script::signature_invocation_script(&signature),
            verification: self.public_key().verification_script(),
        })
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signer::LocalKey(_) => write!(f, "Signer::LocalKey({})", self.public_key()),
            Signer::External(_) => write!(f, "Signer::External({})", self.public_key()),
        }
    }
}

/// Script hashes that must witness `tx`, ascending.
///
/// Collected from the owners of spent coins (looked up in `balance`), the
/// claims owner, `Script` attributes and state descriptors.
pub fn required_signers(tx: &Transaction, balance: Option<&Balance>, claims: Option<&Claims>) -> Vec<ScriptHash> {
    let mut hashes = BTreeSet::new();

    if let Some(balance) = balance {
        for input in &tx.inputs {
            if let Some(owner) = balance.coin_owner(input) {
                hashes.insert(owner);
            }
        }
    }
    if let (TransactionKind::Claim { .. }, Some(claims)) = (&tx.kind, claims) {
        if let Ok(owner) = claims.script_hash() {
            hashes.insert(owner);
        }
    }
    hashes.extend(tx.attributes.iter().filter_map(|a| a.script_hash()));
    if let TransactionKind::State { descriptors } = &tx.kind {
        for descriptor in descriptors {
            match descriptor.kind {
                StateType::Account => hashes.extend(descriptor.account()),
                StateType::Validator => {
                    if let Ok(key) = PublicKey::from_bytes(&descriptor.key) {
                        hashes.insert(key.script_hash());
                    }
                }
            }
        }
    }
    hashes.into_iter().collect()
}

/// Whether every required signer has a witness.
pub fn signing_state(tx: &Transaction, required: &[ScriptHash]) -> TxLifecycle {
    let present = tx.witness_hashes();
    if required.iter().all(|h| present.contains(h)) {
        TxLifecycle::FullySigned
    } else if present.is_empty() {
        TxLifecycle::Unsigned
    } else {
        TxLifecycle::PartiallySigned
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignOptions {
    pub required_signers: Vec<ScriptHash>,
    /// The transaction spends funds owned by a contract rather than the signer.
    pub allow_foreign_sender: bool,
}

/// Sign `tx` with `signer` and insert the witness in script-hash order.
pub async fn sign_transaction(
    tx: &mut Transaction,
    signer: &Signer,
    options: &SignOptions,
) -> KazeResult<TxLifecycle> {
    let signer_hash = signer.script_hash();
    if !options.allow_foreign_sender && !options.required_signers.contains(&signer_hash) {
        let expected = options
            .required_signers
            .iter()
            .map(address_from_script_hash)
            .collect::<Vec<_>>()
            .join(", ");
        return Err(KazeError::AddressMismatch {
            signer: address_from_script_hash(&signer_hash),
            expected,
        });
    }

    let witness = signer.witness(tx).await?;
    tx.add_witness(witness);
    let state = signing_state(tx, &options.required_signers);
    tracing::debug!(txid = %tx.hash(), signer = %address_from_script_hash(&signer_hash), ?state, "Signed transaction");
    Ok(state)
}

/// Check a single-signature witness against `tx`.
pub fn verify_witness(tx: &Transaction, witness: &Witness) -> KazeResult<bool> {
    let key = script::public_key_of(&witness.verification)?;
    let signature = script::signature_of(&witness.invocation)?;
    Ok(key.verify(&tx.unsigned_bytes(), signature))
}

/// Gathers partial signatures for a multi-signature contract.
#[derive(Debug)]
pub struct MultiSigCollector {
    contract: MultiSig,
    message: Vec<u8>,
    signatures: Vec<Option<[u8; 64]>>,
}

impl MultiSigCollector {
    pub fn new(contract: MultiSig, tx: &Transaction) -> Self {
        let slots = contract.public_keys().len();
        Self {
            contract,
            message: tx.unsigned_bytes(),
            signatures: vec![None; slots],
        }
    }

    pub fn script_hash(&self) -> ScriptHash {
        self.contract.script_hash()
    }

    /// Add a partial signature. It must verify against a participant's key.
    pub fn add_signature(&mut self, key: &PublicKey, signature: [u8; 64]) -> KazeResult<bool> {
        let slot = self
            .contract
            .public_keys()
            .iter()
            .position(|k| k == key)
            .ok_or_else(|| KazeError::AddressMismatch {
                signer: address_from_script_hash(&key.script_hash()),
                expected: address_from_script_hash(&self.contract.script_hash()),
            })?;
        if !key.verify(&self.message, &signature) {
            return Err(KazeError::InvalidTransaction("partial signature does not verify".to_string()));
        }
        self.signatures[slot] = Some(signature);
        Ok(self.is_complete())
    }

    pub async fn sign_with(&mut self, signer: &Signer) -> KazeResult<bool> {
        let signature = signer.sign(&self.message).await?;
        self.add_signature(&signer.public_key(), signature)
    }

    pub fn collected(&self) -> usize {
        self.signatures.iter().flatten().count()
    }

    pub fn is_complete(&self) -> bool {
        self.collected() >= self.contract.threshold()
    }

    /// Merge into a witness: the first `threshold` signatures in key order.
    pub fn finish(&self) -> KazeResult<Witness> {
        if !self.is_complete() {
            return Err(KazeError::InvalidTransaction(format!(
                "multisig has {} of {} required signatures",
                self.collected(),
                self.contract.threshold()
            )));
        }
        let signatures: Vec<[u8; 64]> = self
            .signatures
            .iter()
            .flatten()
            .take(self.contract.threshold())
            .copied()
            .collect();
        Ok(Witness {
            invocation: script::multisig_invocation_script(&signatures),
            verification: self.contract.verification_script(),
        })
    }
}
