//! Transaction model and its bit-exact wire encoding.

use std::fmt;

use crate::tx::codec::{BinaryReader, BinaryWriter};
use crate::types::{Hash256, KazeError, KazeResult, ScriptHash};
use crate::wallet::crypto;
use crate::wallet::fixed8::Fixed8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Claim = 0x02,
    Contract = 0x80,
    State = 0x90,
    Invocation = 0xd1,
}

impl TransactionType {
    pub fn from_u8(b: u8) -> KazeResult<Self> {
        match b {
            0x02 => Ok(Self::Claim),
            0x80 => Ok(Self::Contract),
            0x90 => Ok(Self::State),
            0xd1 => Ok(Self::Invocation),
            other => Err(KazeError::MalformedWire(format!("unknown transaction type {:#04x}", other))),
        }
    }

    /// Version written by the builder for this kind.
    pub fn default_version(self) -> u8 {
        match self {
            Self::Invocation => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Claim => "claim",
            Self::Contract => "contract",
            Self::State => "state",
            Self::Invocation => "invocation",
        };
        f.write_str(name)
    }
}

/// Reference to an output of an earlier transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoinReference {
    pub prev_hash: Hash256,
    pub prev_index: u16,
}

impl CoinReference {
    fn write(&self, w: &mut BinaryWriter) {
        w.write_bytes(self.prev_hash.as_le_bytes());
        w.write_u16(self.prev_index);
    }

    fn read(r: &mut BinaryReader<'_>) -> KazeResult<Self> {
        Ok(Self {
            prev_hash: Hash256::from_le_bytes(r.read_array()?),
            prev_index: r.read_u16()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutput {
    pub asset_id: Hash256,
    pub value: Fixed8,
    pub script_hash: ScriptHash,
}

impl TransactionOutput {
    fn write(&self, w: &mut BinaryWriter) {
        w.write_bytes(self.asset_id.as_le_bytes());
        w.write_i64(self.value.raw());
        w.write_bytes(self.script_hash.as_le_bytes());
    }

    fn read(r: &mut BinaryReader<'_>) -> KazeResult<Self> {
        Ok(Self {
            asset_id: Hash256::from_le_bytes(r.read_array()?),
            value: Fixed8::from_raw(r.read_i64()?),
            script_hash: ScriptHash::from_le_bytes(r.read_array()?),
        })
    }
}

/// Attribute usage bytes.
pub mod usage {
    pub const CONTRACT_HASH: u8 = 0x00;
    pub const ECDH02: u8 = 0x02;
    pub const ECDH03: u8 = 0x03;
    pub const SCRIPT: u8 = 0x20;
    pub const VOTE: u8 = 0x30;
    pub const DESCRIPTION_URL: u8 = 0x81;
    pub const DESCRIPTION: u8 = 0x90;
    pub const HASH1: u8 = 0xa1;
    pub const HASH15: u8 = 0xaf;
    pub const REMARK: u8 = 0xf0;
}

enum AttributeData {
    Fixed(usize),
    ShortPrefixed,
    VarPrefixed,
}

fn attribute_layout(u: u8) -> Option<AttributeData> {
    match u {
        usage::CONTRACT_HASH | usage::VOTE | usage::HASH1..=usage::HASH15 => Some(AttributeData::Fixed(32)),
        usage::ECDH02 | usage::ECDH03 => Some(AttributeData::Fixed(32)),
        usage::SCRIPT => Some(AttributeData::Fixed(20)),
        usage::DESCRIPTION_URL => Some(AttributeData::ShortPrefixed),
        usage::DESCRIPTION | usage::REMARK..=0xff => Some(AttributeData::VarPrefixed),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionAttribute {
    usage: u8,
    data: Vec<u8>,
}

impl TransactionAttribute {
    /// Validates the usage byte and the data length it implies.
    pub fn new(usage: u8, data: Vec<u8>) -> KazeResult<Self> {
        let ok = match attribute_layout(usage) {
            Some(AttributeData::Fixed(n)) => data.len() == n,
            Some(AttributeData::ShortPrefixed) => data.len() <= 0xff,
            Some(AttributeData::VarPrefixed) => true,
            None => false,
        };
        if !ok {
            return Err(KazeError::InvalidTransaction(format!(
                "attribute {:#04x} cannot carry {} bytes",
                usage,
                data.len()
            )));
        }
        Ok(Self { usage, data })
    }

    /// `Script` attribute naming an extra required signer.
    pub fn script(script_hash: &ScriptHash) -> Self {
        Self { usage: usage::SCRIPT, data: script_hash.as_le_bytes().to_vec() }
    }

    pub fn remark(text: &str) -> Self {
        Self { usage: usage::REMARK, data: text.as_bytes().to_vec() }
    }

    pub fn usage(&self) -> u8 {
        self.usage
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Script hash carried by a `Script` attribute.
    pub fn script_hash(&self) -> Option<ScriptHash> {
        if self.usage != usage::SCRIPT {
            return None;
        }
        let bytes: [u8; 20] = self.data.as_slice().try_into().ok()?;
        Some(ScriptHash::from_le_bytes(bytes))
    }

    fn write(&self, w: &mut BinaryWriter) {
        w.write_u8(self.usage);
        match attribute_layout(self.usage) {
            Some(AttributeData::ShortPrefixed) => {
                w.write_u8(self.data.len() as u8);
                w.write_bytes(&self.data);
            }
            Some(AttributeData::VarPrefixed) => w.write_var_bytes(&self.data),
            _ => w.write_bytes(&self.data),
        }
    }

    fn read(r: &mut BinaryReader<'_>) -> KazeResult<Self> {
        let usage = r.read_u8()?;
        let data = match attribute_layout(usage) {
            Some(AttributeData::Fixed(n)) => r.read_bytes(n)?.to_vec(),
            Some(AttributeData::ShortPrefixed) => {
                let len = r.read_u8()? as usize;
                r.read_bytes(len)?.to_vec()
            }
            Some(AttributeData::VarPrefixed) => r.read_var_bytes()?.to_vec(),
            None => {
                return Err(KazeError::MalformedWire(format!("unknown attribute usage {:#04x}", usage)));
            }
        };
        Ok(Self { usage, data })
    }
}

/// Invocation/verification script pair proving one signer's consent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness {
    pub invocation: Vec<u8>,
    pub verification: Vec<u8>,
}

impl Witness {
    pub fn script_hash(&self) -> ScriptHash {
        ScriptHash::from_script(&self.verification)
    }

    fn write(&self, w: &mut BinaryWriter) {
        w.write_var_bytes(&self.invocation);
        w.write_var_bytes(&self.verification);
    }

    fn read(r: &mut BinaryReader<'_>) -> KazeResult<Self> {
        Ok(Self {
            invocation: r.read_var_bytes()?.to_vec(),
            verification: r.read_var_bytes()?.to_vec(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateType {
    Account = 0x40,
    Validator = 0x48,
}

impl StateType {
    fn from_u8(b: u8) -> KazeResult<Self> {
        match b {
            0x40 => Ok(Self::Account),
            0x48 => Ok(Self::Validator),
            other => Err(KazeError::MalformedWire(format!("unknown state type {:#04x}", other))),
        }
    }
}

/// A vote or registration record carried by a state transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDescriptor {
    pub kind: StateType,
    pub key: Vec<u8>,
    pub field: String,
    pub value: Vec<u8>,
}

impl StateDescriptor {
    /// Owning account of an `Account` descriptor.
    pub fn account(&self) -> Option<ScriptHash> {
        if self.kind != StateType::Account {
            return None;
        }
        let bytes: [u8; 20] = self.key.as_slice().try_into().ok()?;
        Some(ScriptHash::from_le_bytes(bytes))
    }

    fn write(&self, w: &mut BinaryWriter) {
        w.write_u8(self.kind as u8);
        w.write_var_bytes(&self.key);
        w.write_var_string(&self.field);
        w.write_var_bytes(&self.value);
    }

    fn read(r: &mut BinaryReader<'_>) -> KazeResult<Self> {
        Ok(Self {
            kind: StateType::from_u8(r.read_u8()?)?,
            key: r.read_var_bytes()?.to_vec(),
            field: r.read_var_string()?,
            value: r.read_var_bytes()?.to_vec(),
        })
    }
}

/// Kind-specific payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionKind {
    Claim { claims: Vec<CoinReference> },
    Contract,
    Invocation { script: Vec<u8>, gas: Fixed8 },
    State { descriptors: Vec<StateDescriptor> },
}

impl TransactionKind {
    pub fn tx_type(&self) -> TransactionType {
        match self {
            Self::Claim { .. } => TransactionType::Claim,
            Self::Contract => TransactionType::Contract,
            Self::Invocation { .. } => TransactionType::Invocation,
            Self::State { .. } => TransactionType::State,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u8,
    pub kind: TransactionKind,
    pub attributes: Vec<TransactionAttribute>,
    pub inputs: Vec<CoinReference>,
    pub outputs: Vec<TransactionOutput>,
    pub scripts: Vec<Witness>,
}

impl Transaction {
    /// Empty transaction of the given kind at its default version.
    pub fn new(kind: TransactionKind) -> Self {
        Self {
            version: kind.tx_type().default_version(),
            kind,
            attributes: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            scripts: Vec::new(),
        }
    }

    pub fn tx_type(&self) -> TransactionType {
        self.kind.tx_type()
    }

    /// Wire bytes; `with_witnesses = false` yields the signed-over payload.
    pub fn serialize(&self, with_witnesses: bool) -> Vec<u8> {
        let mut w = BinaryWriter::new();
        w.write_u8(self.tx_type() as u8);
        w.write_u8(self.version);
        self.write_exclusive(&mut w);

        w.write_var_int(self.attributes.len() as u64);
        for attr in &self.attributes {
            attr.write(&mut w);
        }
        w.write_var_int(self.inputs.len() as u64);
        for input in &self.inputs {
            input.write(&mut w);
        }
        w.write_var_int(self.outputs.len() as u64);
        for output in &self.outputs {
            output.write(&mut w);
        }
        if with_witnesses {
            w.write_var_int(self.scripts.len() as u64);
            for script in &self.scripts {
                script.write(&mut w);
            }
        }
        w.into_inner()
    }

    pub fn unsigned_bytes(&self) -> Vec<u8> {
        self.serialize(false)
    }

    fn write_exclusive(&self, w: &mut BinaryWriter) {
        match &self.kind {
            TransactionKind::Claim { claims } => {
                w.write_var_int(claims.len() as u64);
                for claim in claims {
                    claim.write(w);
                }
            }
            TransactionKind::Contract => {}
            TransactionKind::Invocation { script, gas } => {
                w.write_var_bytes(script);
                if self.version >= 1 {
                    w.write_i64(gas.raw());
                }
            }
            TransactionKind::State { descriptors } => {
                w.write_var_int(descriptors.len() as u64);
                for descriptor in descriptors {
                    descriptor.write(w);
                }
            }
        }
    }

    /// Inverse of [`serialize`](Self::serialize). A missing witness section
    /// decodes as no witnesses; trailing bytes are rejected.
    pub fn deserialize(bytes: &[u8]) -> KazeResult<Self> {
        let mut r = BinaryReader::new(bytes);
        let tx_type = TransactionType::from_u8(r.read_u8()?)?;
        let version = r.read_u8()?;

        let kind = match tx_type {
            TransactionType::Claim => {
                let n = r.read_length()?;
                let claims = (0..n).map(|_| CoinReference::read(&mut r)).collect::<KazeResult<_>>()?;
                TransactionKind::Claim { claims }
            }
            TransactionType::Contract => TransactionKind::Contract,
            TransactionType::Invocation => {
                let script = r.read_var_bytes()?.to_vec();
                let gas = if version >= 1 { Fixed8::from_raw(r.read_i64()?) } else { Fixed8::ZERO };
                TransactionKind::Invocation { script, gas }
            }
            TransactionType::State => {
                let n = r.read_length()?;
                let descriptors = (0..n).map(|_| StateDescriptor::read(&mut r)).collect::<KazeResult<_>>()?;
                TransactionKind::State { descriptors }
            }
        };

        let n = r.read_length()?;
        let attributes = (0..n).map(|_| TransactionAttribute::read(&mut r)).collect::<KazeResult<_>>()?;
        let n = r.read_length()?;
        let inputs = (0..n).map(|_| CoinReference::read(&mut r)).collect::<KazeResult<_>>()?;
        let n = r.read_length()?;
        let outputs = (0..n).map(|_| TransactionOutput::read(&mut r)).collect::<KazeResult<_>>()?;

        let scripts = if r.is_empty() {
            Vec::new()
        } else {
            let n = r.read_length()?;
            (0..n).map(|_| Witness::read(&mut r)).collect::<KazeResult<_>>()?
        };

        if !r.is_empty() {
            return Err(KazeError::MalformedWire(format!(
                "{} trailing bytes after transaction",
                r.remaining()
            )));
        }

        Ok(Self { version, kind, attributes, inputs, outputs, scripts })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize(true))
    }

    pub fn from_hex(s: &str) -> KazeResult<Self> {
        let bytes = hex::decode(s).map_err(|e| KazeError::MalformedWire(format!("invalid hex: {}", e)))?;
        Self::deserialize(&bytes)
    }

    /// Double SHA-256 of the unsigned payload. Displays as the txid.
    pub fn hash(&self) -> Hash256 {
        Hash256::from_le_bytes(crypto::hash256(&self.unsigned_bytes()))
    }

    /// Insert or replace the witness for its script hash, keeping ascending order.
    pub fn add_witness(&mut self, witness: Witness) {
        let hash = witness.script_hash();
        self.scripts.retain(|w| w.script_hash() != hash);
        self.scripts.push(witness);
        self.scripts.sort_by_key(Witness::script_hash);
    }

    pub fn witness_hashes(&self) -> Vec<ScriptHash> {
        self.scripts.iter().map(Witness::script_hash).collect()
    }
}

/// Stages a transaction moves through from construction to settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxLifecycle {
    #[default]
    Draft,
    Unsigned,
    PartiallySigned,
    FullySigned,
    Submitted,
    Confirmed,
    Rejected,
}
