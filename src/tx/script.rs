//! VM script assembly: push encodings, contract calls and the standard
//! verification/invocation scripts attached as witnesses.

use crate::types::{KazeError, KazeResult, ScriptHash};
use crate::wallet::account::PublicKey;

pub mod opcode {
    pub const PUSH0: u8 = 0x00;
    pub const PUSHBYTES33: u8 = 0x21;
    pub const PUSHBYTES64: u8 = 0x40;
    pub const PUSHBYTES75: u8 = 0x4b;
    pub const PUSHDATA1: u8 = 0x4c;
    pub const PUSHDATA2: u8 = 0x4d;
    pub const PUSHDATA4: u8 = 0x4e;
    pub const PUSHM1: u8 = 0x4f;
    pub const PUSH1: u8 = 0x51;
    pub const PUSH16: u8 = 0x60;
    pub const APPCALL: u8 = 0x67;
    pub const CHECKSIG: u8 = 0xac;
    pub const CHECKMULTISIG: u8 = 0xae;
    pub const PACK: u8 = 0xc1;
}

/// Argument to a contract invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractParam {
    Boolean(bool),
    Integer(i64),
    ByteArray(Vec<u8>),
    String(String),
    Hash160(ScriptHash),
    Array(Vec<ContractParam>),
}

#[derive(Debug, Default)]
pub struct ScriptBuilder {
    script: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, op: u8) -> &mut Self {
        self.script.push(op);
        self
    }

    pub fn emit_push_bytes(&mut self, data: &[u8]) -> &mut Self {
        let len = data.len();
        if len <= opcode::PUSHBYTES75 as usize {
            self.script.push(len as u8);
        } else if len <= 0xff {
            self.script.push(opcode::PUSHDATA1);
            self.script.push(len as u8);
        } else if len <= 0xffff {
            self.script.push(opcode::PUSHDATA2);
            self.script.extend_from_slice(&(len as u16).to_le_bytes());
        } else {
            self.script.push(opcode::PUSHDATA4);
            self.script.extend_from_slice(&(len as u32).to_le_bytes());
        }
        self.script.extend_from_slice(data);
        self
    }

    pub fn emit_push_int(&mut self, n: i64) -> &mut Self {
        match n {
            -1 => self.emit(opcode::PUSHM1),
            0 => self.emit(opcode::PUSH0),
            1..=16 => self.emit(opcode::PUSH1 - 1 + n as u8),
            _ => self.emit_push_bytes(&int_to_le_bytes(n)),
        }
    }

    pub fn emit_push_bool(&mut self, b: bool) -> &mut Self {
        self.emit(if b { opcode::PUSH1 } else { opcode::PUSH0 })
    }

    pub fn emit_push_string(&mut self, s: &str) -> &mut Self {
        self.emit_push_bytes(s.as_bytes())
    }

    pub fn emit_push_param(&mut self, param: &ContractParam) -> &mut Self {
        match param {
            ContractParam::Boolean(b) => self.emit_push_bool(*b),
            ContractParam::Integer(n) => self.emit_push_int(*n),
            ContractParam::ByteArray(bytes) => self.emit_push_bytes(bytes),
            ContractParam::String(s) => self.emit_push_string(s),
            ContractParam::Hash160(hash) => self.emit_push_bytes(hash.as_le_bytes()),
            ContractParam::Array(items) => self.emit_push_array(items),
        }
    }

    /// Items are pushed last-first so the VM sees them in order after `PACK`.
    pub fn emit_push_array(&mut self, items: &[ContractParam]) -> &mut Self {
        for item in items.iter().rev() {
            self.emit_push_param(item);
        }
        self.emit_push_int(items.len() as i64);
        self.emit(opcode::PACK)
    }

    /// `APPCALL` into `script_hash` with an optional operation name.
    pub fn emit_app_call(
        &mut self,
        script_hash: &ScriptHash,
        operation: Option<&str>,
        args: &[ContractParam],
    ) -> &mut Self {
        if args.is_empty() {
            self.emit_push_bool(false);
        } else {
            self.emit_push_array(args);
        }
        if let Some(operation) = operation {
            self.emit_push_string(operation);
        }
        self.emit(opcode::APPCALL);
        self.script.extend_from_slice(script_hash.as_le_bytes());
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.script.clone()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.script
    }
}

/// Minimal little-endian two's complement, matching VM big-integer encoding.
fn int_to_le_bytes(n: i64) -> Vec<u8> {
    let mut bytes = n.to_le_bytes().to_vec();
    while bytes.len() > 1 {
        let last = bytes[bytes.len() - 1];
        let prev_sign = bytes[bytes.len() - 2] & 0x80;
        if (last == 0x00 && prev_sign == 0) || (last == 0xff && prev_sign != 0) {
            bytes.pop();
        } else {
            break;
        }
    }
    bytes
}

/// `PUSHBYTES33 <key> CHECKSIG`.
pub fn single_sig_verification_script(key: &PublicKey) -> Vec<u8> {
    let mut script = Vec::with_capacity(35);
    script.push(opcode::PUSHBYTES33);
    script.extend_from_slice(&key.to_compressed());
    script.push(opcode::CHECKSIG);
    script
}

/// `PUSH(m) <keys...> PUSH(n) CHECKMULTISIG`, keys in the order given.
pub fn multisig_verification_script(threshold: usize, keys: &[PublicKey]) -> Vec<u8> {
    let mut sb = ScriptBuilder::new();
    sb.emit_push_int(threshold as i64);
    for key in keys {
        sb.emit_push_bytes(&key.to_compressed());
    }
    sb.emit_push_int(keys.len() as i64);
    sb.emit(opcode::CHECKMULTISIG);
    sb.into_bytes()
}

/// `PUSHBYTES64 <signature>`.
pub fn signature_invocation_script(signature: &[u8; 64]) -> Vec<u8> {
    let mut script = Vec::with_capacity(65);
    script.push(opcode::PUSHBYTES64);
    script.extend_from_slice(signature);
    script
}

/// One `PUSHBYTES64` per signature, in the order given.
pub fn multisig_invocation_script(signatures: &[[u8; 64]]) -> Vec<u8> {
    signatures.iter().flat_map(|s| signature_invocation_script(s)).collect()
}

/// Extract the public key of a single-signature verification script.
pub fn public_key_of(verification: &[u8]) -> KazeResult<PublicKey> {
    match verification {
        [opcode::PUSHBYTES33, key @ .., opcode::CHECKSIG] if key.len() == 33 => PublicKey::from_bytes(key),
        _ => Err(KazeError::InvalidTransaction(
            "not a single-signature verification script".to_string(),
        )),
    }
}

/// Extract the signature of a single-signature invocation script.
pub fn signature_of(invocation: &[u8]) -> KazeResult<&[u8]> {
    match invocation {
        [opcode::PUSHBYTES64, sig @ ..] if sig.len() == 64 => Ok(sig),
        _ => Err(KazeError::InvalidTransaction(
            "not a single-signature invocation script".to_string(),
        )),
    }
}
