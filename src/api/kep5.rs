//! KEP5 token queries and transfers.
//!
//! Reads run as `invokescript` against a node: several contract calls are
//! packed into one script and their results read back off the VM stack.
//! Token amounts are scaled by the token's `decimals` into [`Fixed8`], so
//! tokens with more than 8 decimals are rejected.

use std::collections::BTreeMap;

use crate::api::pipeline::{InvocationScript, Pipeline, SubmitOutcome, TxRequest};
use crate::net::Transport;
use crate::provider::Provider;
use crate::rpc::{RpcClient, StackItem};
use crate::tx::script::{ContractParam, ScriptBuilder};
use crate::types::{KazeError, KazeResult, ScriptHash};
use crate::wallet::account::script_hash_from_address;
use crate::wallet::fixed8::Fixed8;

const MAX_DECIMALS: u8 = 8;

/// Static description of a token contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: Fixed8,
}

/// Token description plus the balance of an address, when one was asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub info: TokenInfo,
    pub balance: Option<Fixed8>,
}

pub async fn get_token_info<T: Transport>(rpc: &RpcClient<T>, token: &ScriptHash) -> KazeResult<TokenInfo> {
    let mut sb = ScriptBuilder::new();
    for operation in ["name", "symbol", "decimals", "totalSupply"] {
        sb.emit_app_call(token, Some(operation), &[]);
    }
    let stack = run(rpc, &sb.into_bytes(), 4).await?;
    let decimals = decimals_of(&stack[2])?;
    let info = TokenInfo {
        name: stack_string(&stack[0])?,
        symbol: stack_string(&stack[1])?,
        decimals,
        total_supply: scale(stack_integer(&stack[3])?, decimals)?,
    };
    tracing::debug!(token = %token, symbol = %info.symbol, decimals, "Retrieved token info");
    Ok(info)
}

pub async fn get_token_balance<T: Transport>(
    rpc: &RpcClient<T>,
    token: &ScriptHash,
    address: &str,
) -> KazeResult<Fixed8> {
    let owner = script_hash_from_address(address)?;
    let mut sb = ScriptBuilder::new();
    sb.emit_app_call(token, Some("decimals"), &[])
        .emit_app_call(token, Some("balanceOf"), &[ContractParam::Hash160(owner)]);
    let stack = run(rpc, &sb.into_bytes(), 2).await?;
    scale(stack_integer(&stack[1])?, decimals_of(&stack[0])?)
}

/// Balances of several tokens in one invocation, keyed by token symbol.
pub async fn get_token_balances<T: Transport>(
    rpc: &RpcClient<T>,
    tokens: &[ScriptHash],
    address: &str,
) -> KazeResult<BTreeMap<String, Fixed8>> {
    if tokens.is_empty() {
        return Ok(BTreeMap::new());
    }
    let owner = script_hash_from_address(address)?;
    let mut sb = ScriptBuilder::new();
    for token in tokens {
        sb.emit_app_call(token, Some("symbol"), &[])
            .emit_app_call(token, Some("decimals"), &[])
            .emit_app_call(token, Some("balanceOf"), &[ContractParam::Hash160(owner)]);
    }
    let stack = run(rpc, &sb.into_bytes(), tokens.len() * 3).await?;

    let mut balances = BTreeMap::new();
    for entry in stack.chunks_exact(3) {
        let decimals = decimals_of(&entry[1])?;
        balances.insert(stack_string(&entry[0])?, scale(stack_integer(&entry[2])?, decimals)?);
    }
    tracing::debug!(address, tokens = tokens.len(), "Retrieved token balances");
    Ok(balances)
}

pub async fn get_token<T: Transport>(
    rpc: &RpcClient<T>,
    token: &ScriptHash,
    address: Option<&str>,
) -> KazeResult<Token> {
    let info = get_token_info(rpc, token).await?;
    let balance = match address {
        Some(address) => Some(get_token_balance(rpc, token, address).await?),
        None => None,
    };
    Ok(Token { info, balance })
}

impl<A: Provider, B: Provider, T: Transport> Pipeline<A, B, T> {
    /// Invocation calling the token's `transfer` from the funding address to `to`.
    pub async fn transfer_token(
        &self,
        req: &mut TxRequest,
        token: &ScriptHash,
        to: &str,
        amount: Fixed8,
    ) -> KazeResult<SubmitOutcome> {
        if !amount.is_positive() {
            return Err(KazeError::InvalidAmount(format!("token transfer of {}", amount)));
        }
        self.fill_url(req).await?;
        self.fill_keys(req)?;
        if req.script.is_none() {
            let url = req.url.clone().ok_or(KazeError::MissingField("url"))?;
            let info = get_token_info(&self.rpc(&url), token).await?;
            let from = script_hash_from_address(&req.funding_address()?)?;
            let args = vec![
                ContractParam::Hash160(from),
                ContractParam::Hash160(script_hash_from_address(to)?),
                ContractParam::Integer(unscale(amount, info.decimals)?),
            ];
            tracing::info!(net = %req.net, token = %info.symbol, to, amount = %amount, "Transferring tokens");
            req.script = Some(InvocationScript::Call {
                script_hash: *token,
                operation: Some("transfer".to_string()),
                args,
            });
        }
        self.do_invoke(req).await
    }
}

async fn run<T: Transport>(rpc: &RpcClient<T>, script: &[u8], expected: usize) -> KazeResult<Vec<StackItem>> {
    let result = rpc.invoke_script(script).await?;
    if result.faulted() {
        return Err(KazeError::UnexpectedResponse(format!("token script ended in {}", result.state)));
    }
    if result.stack.len() < expected {
        return Err(KazeError::UnexpectedResponse(format!(
            "expected {} stack items, got {}",
            expected,
            result.stack.len()
        )));
    }
    Ok(result.stack)
}

fn stack_bytes(item: &StackItem) -> KazeResult<Vec<u8>> {
    let text = item.value.as_str().unwrap_or_default();
    hex::decode(text).map_err(|e| KazeError::UnexpectedResponse(format!("stack item is not hex: {}", e)))
}

fn stack_string(item: &StackItem) -> KazeResult<String> {
    match item.kind.as_str() {
        "String" => Ok(item.value.as_str().unwrap_or_default().to_string()),
        "ByteArray" => String::from_utf8(stack_bytes(item)?)
            .map_err(|_| KazeError::UnexpectedResponse("stack item is not UTF-8".to_string())),
        other => Err(KazeError::UnexpectedResponse(format!("expected a string, got {}", other))),
    }
}

/// VM integers arrive as decimal text or as little-endian two's complement bytes.
fn stack_integer(item: &StackItem) -> KazeResult<i128> {
    match item.kind.as_str() {
        "Integer" => match &item.value {
            serde_json::Value::String(s) => s
                .parse()
                .map_err(|_| KazeError::UnexpectedResponse(format!("bad integer '{}'", s))),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(i128::from)
                .ok_or_else(|| KazeError::UnexpectedResponse(format!("bad integer {}", n))),
            other => Err(KazeError::UnexpectedResponse(format!("bad integer {}", other))),
        },
        "ByteArray" => {
            let bytes = stack_bytes(item)?;
            if bytes.len() > 16 {
                return Err(KazeError::InvalidAmount(format!("{}-byte integer", bytes.len())));
            }
            let fill = match bytes.last() {
                Some(b) if b & 0x80 != 0 => 0xff,
                _ => 0x00,
            };
            let mut buf = [fill; 16];
            buf[..bytes.len()].copy_from_slice(&bytes);
            Ok(i128::from_le_bytes(buf))
        }
        "Boolean" => Ok(i128::from(item.value.as_bool().unwrap_or(false))),
        other => Err(KazeError::UnexpectedResponse(format!("expected an integer, got {}", other))),
    }
}

fn decimals_of(item: &StackItem) -> KazeResult<u8> {
    let decimals = stack_integer(item)?;
    u8::try_from(decimals)
        .ok()
        .filter(|d| *d <= MAX_DECIMALS)
        .ok_or_else(|| KazeError::InvalidAmount(format!("token with {} decimals", decimals)))
}

fn scale(raw: i128, decimals: u8) -> KazeResult<Fixed8> {
    let factor = 10i128.pow(u32::from(MAX_DECIMALS - decimals));
    raw.checked_mul(factor)
        .and_then(|v| i64::try_from(v).ok())
        .map(Fixed8::from_raw)
        .ok_or_else(|| KazeError::InvalidAmount(format!("token amount {} out of range", raw)))
}

fn unscale(amount: Fixed8, decimals: u8) -> KazeResult<i64> {
    let factor = 10i64.pow(u32::from(MAX_DECIMALS - decimals));
    if amount.raw() % factor != 0 {
        return Err(KazeError::InvalidAmount(format!(
            "{} has more precision than {} decimals",
            amount, decimals
        )));
    }
    Ok(amount.raw() / factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::KazeConfig;
    use crate::load_balancer::{AccessRouter, RouterState};
    use crate::net::transport::testing::StaticTransport;
    use crate::provider::{Kazescan, KryptonDb};
    use crate::tx::types::{TransactionKind, TxLifecycle};
    use crate::types::KAZE;
    use crate::wallet::account::{Account, PrivateKey};
    use crate::wallet::balance::{AssetInit, Balance};
    use serde_json::json;

    const NODE: &str = "http://node.test:22886";
    const TOKEN: &str = "ecc6b20d3ccac1ee9ef109af5a7cdb85706b1df9";
    const SECOND_TOKEN: &str = "0a0b0c0d0e0f101112131415161718191a1b1c1d";
    const ADDRESS: &str = "KC74MjETUTAc5qv3fqL1UiyP9DRqeQgWSR";
    const RECIPIENT: &str = "KCGNpuR2nsqe6JNHNyRFx4j6iLU9BN6rBb";
    const INFO_SCRIPT: &str = "00046e616d6567f91d6b7085db7c5aaf09f19eeec1ca3c0db2c6ec000673796d626f6c67f91d6b7085db7c5aaf09f19eeec1ca3c0db2c6ec0008646563696d616c7367f91d6b7085db7c5aaf09f19eeec1ca3c0db2c6ec000b746f74616c537570706c7967f91d6b7085db7c5aaf09f19eeec1ca3c0db2c6ec";
    const TRANSFER_SCRIPT: &str = "0480b2e60e143775292229eccdf904f16fff8e83e7cffdc0f0ce1435b20010db73bf86371075ddfba4e6596f1ff35d53c1087472616e7366657267f91d6b7085db7c5aaf09f19eeec1ca3c0db2c6ec";

    fn token() -> ScriptHash {
        ScriptHash::from_be_hex(TOKEN).unwrap()
    }

    fn halt(stack: serde_json::Value) -> serde_json::Value {
        json!({"state": "HALT, BREAK", "gas_consumed": "0.5", "stack": stack})
    }

    fn info_stack() -> serde_json::Value {
        json!([
            {"type": "ByteArray", "value": "4c4f43414c544f4b454e"},
            {"type": "ByteArray", "value": "4c575446"},
            {"type": "Integer", "value": "8"},
            {"type": "ByteArray", "value": "8058895d14b300"}
        ])
    }

    #[tokio::test]
    async fn test_token_info() {
        let transport = StaticTransport::new();
        transport.on_rpc_param(NODE, "invokescript", INFO_SCRIPT, halt(info_stack()));
        let rpc = RpcClient::new(&transport, NODE);

        let info = get_token_info(&rpc, &token()).await.unwrap();
        assert_eq!(info.name, "LOCALTOKEN");
        assert_eq!(info.symbol, "LWTF");
        assert_eq!(info.decimals, 8);
        assert_eq!(info.total_supply.to_string(), "1969000.5");
    }

    #[tokio::test]
    async fn test_token_balance_scales_by_decimals() {
        let transport = StaticTransport::new();
        transport.on_rpc(
            NODE,
            "invokescript",
            halt(json!([{"type": "Integer", "value": "4"}, {"type": "ByteArray", "value": "1234"}])),
        );
        let rpc = RpcClient::new(&transport, NODE);

        // 13330 raw units at 4 decimals.
        let balance = get_token_balance(&rpc, &token(), ADDRESS).await.unwrap();
        assert_eq!(balance.to_string(), "1.333");
    }

    #[tokio::test]
    async fn test_token_balances_keyed_by_symbol() {
        let transport = StaticTransport::new();
        transport.on_rpc(
            NODE,
            "invokescript",
            halt(json!([
                {"type": "ByteArray", "value": "4c575446"},
                {"type": "Integer", "value": "8"},
                {"type": "ByteArray", "value": "1234"},
                {"type": "ByteArray", "value": "4e5854"},
                {"type": "Integer", "value": 8},
                {"type": "ByteArray", "value": "5678"}
            ])),
        );
        let rpc = RpcClient::new(&transport, NODE);
        let tokens = [token(), ScriptHash::from_be_hex(SECOND_TOKEN).unwrap()];

        let balances = get_token_balances(&rpc, &tokens, ADDRESS).await.unwrap();
        assert_eq!(balances["LWTF"].to_string(), "0.0001333");
        assert_eq!(balances["NXT"].to_string(), "0.00030806");
        assert!(get_token_balances(&rpc, &[], ADDRESS).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_token_with_and_without_address() {
        let transport = StaticTransport::new();
        transport.on_rpc_param(NODE, "invokescript", INFO_SCRIPT, halt(info_stack()));
        transport.on_rpc(
            NODE,
            "invokescript",
            halt(json!([{"type": "Integer", "value": "8"}, {"type": "ByteArray", "value": ""}])),
        );
        let rpc = RpcClient::new(&transport, NODE);

        let bare = get_token(&rpc, &token(), None).await.unwrap();
        assert_eq!(bare.info.symbol, "LWTF");
        assert!(bare.balance.is_none());

        let held = get_token(&rpc, &token(), Some(RECIPIENT)).await.unwrap();
        assert_eq!(held.balance, Some(Fixed8::ZERO));
    }

    #[tokio::test]
    async fn test_faulted_script_is_an_error() {
        let transport = StaticTransport::new();
        transport.on_rpc(NODE, "invokescript", json!({"state": "FAULT, BREAK", "stack": []}));
        let rpc = RpcClient::new(&transport, NODE);

        let err = get_token_info(&rpc, &token()).await.unwrap_err();
        assert!(matches!(err, KazeError::UnexpectedResponse(_)));
    }

    #[test]
    fn test_integer_decoding() {
        let item = |kind: &str, value: serde_json::Value| StackItem { kind: kind.to_string(), value };
        assert_eq!(stack_integer(&item("ByteArray", json!("fb"))).unwrap(), -5);
        assert_eq!(stack_integer(&item("ByteArray", json!("8000"))).unwrap(), 128);
        assert_eq!(stack_integer(&item("ByteArray", json!(""))).unwrap(), 0);
        assert_eq!(stack_integer(&item("Boolean", json!(true))).unwrap(), 1);
        assert!(decimals_of(&item("Integer", json!("18"))).is_err());
    }

    #[test]
    fn test_transfer_amount_respects_decimals() {
        let amount: Fixed8 = "2.5".parse().unwrap();
        assert_eq!(unscale(amount, 8).unwrap(), 250_000_000);
        assert_eq!(unscale(amount, 1).unwrap(), 25);
        assert!(unscale("0.01".parse().unwrap(), 1).is_err());
    }

    #[tokio::test]
    async fn test_transfer_token_invokes_transfer() {
        let transport = StaticTransport::new();
        transport.on_rpc_param(NODE, "invokescript", INFO_SCRIPT, halt(info_stack()));
        transport.on_rpc(NODE, "sendrawtransaction", json!(true));

        let config = Arc::new(KazeConfig::default());
        let state = Arc::new(RouterState::default());
        let router = AccessRouter::new(
            Kazescan::new(&transport, config.clone(), state.endpoints().clone()),
            KryptonDb::new(&transport, config.clone(), state.endpoints().clone()),
            state,
        );
        let pipeline = Pipeline::new(router, &transport, config);

        let account = Account::from_private_key(
            PrivateKey::from_hex("9ab7e154840daca3a2efadaf0df93cd3a5b51768c632f5433f86909d9b994a69").unwrap(),
        );
        let mut balance = Balance::new(ADDRESS, "TestNet").unwrap();
        balance.add_asset(KAZE, AssetInit::default()).unwrap();
        let mut req = TxRequest::new("TestNet").with_url(NODE).with_account(account).with_balance(balance);

        let outcome = pipeline
            .transfer_token(&mut req, &token(), RECIPIENT, "2.5".parse().unwrap())
            .await
            .unwrap();
        let tx = req.tx.as_ref().unwrap();
        assert_eq!(outcome.txid, tx.hash());
        assert_eq!(req.stage, TxLifecycle::Submitted);
        match &tx.kind {
            TransactionKind::Invocation { script, gas } => {
                assert_eq!(hex::encode(script), TRANSFER_SCRIPT);
                assert!(gas.is_zero());
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert!(tx.inputs.is_empty());
        assert_eq!(tx.witness_hashes(), vec![ScriptHash::from_be_hex("5df31f6f59e6a4fbdd75103786bf73db1000b235").unwrap()]);
    }

    #[tokio::test]
    async fn test_transfer_token_rejects_non_positive_amount() {
        let transport = StaticTransport::new();
        let config = Arc::new(KazeConfig::default());
        let state = Arc::new(RouterState::default());
        let router = AccessRouter::new(
            Kazescan::new(&transport, config.clone(), state.endpoints().clone()),
            KryptonDb::new(&transport, config.clone(), state.endpoints().clone()),
            state,
        );
        let pipeline = Pipeline::new(router, &transport, config);
        let mut req = TxRequest::new("TestNet").with_url(NODE);

        let err = pipeline.transfer_token(&mut req, &token(), RECIPIENT, Fixed8::ZERO).await.unwrap_err();
        assert!(matches!(err, KazeError::InvalidAmount(_)));
        assert!(transport.calls().is_empty());
    }
}
