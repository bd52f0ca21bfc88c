//! Coin selection and assembly of unsigned transactions.
//!
//! # Responsibilities
//! - Greedy per-asset coin selection with a single change output
//! - One assembly path per transaction kind
//! - Record the built transaction in the caller's balance, only on success

use crate::tx::codec::BinaryWriter;
use crate::tx::types::{
    CoinReference, StateDescriptor, StateType, Transaction, TransactionAttribute, TransactionKind,
    TransactionOutput, TransactionType,
};
use crate::types::{asset_id, asset_symbol, fee_asset_id, Hash256, KazeError, KazeResult, ScriptHash};
use crate::wallet::account::{script_hash_from_address, PublicKey};
use crate::wallet::balance::Balance;
use crate::wallet::claims::Claims;
use crate::wallet::fixed8::Fixed8;

/// A requested value movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub asset_id: Hash256,
    pub value: Fixed8,
    pub script_hash: ScriptHash,
}

impl Intent {
    fn to_output(&self) -> TransactionOutput {
        TransactionOutput {
            asset_id: self.asset_id,
            value: self.value,
            script_hash: self.script_hash,
        }
    }
}

/// Intents paying each `(symbol, amount)` to `address`.
pub fn make_intents(amounts: &[(&str, Fixed8)], address: &str) -> KazeResult<Vec<Intent>> {
    let script_hash = script_hash_from_address(address)?;
    amounts
        .iter()
        .map(|(symbol, value)| {
            let asset_id = asset_id(symbol)
                .ok_or_else(|| KazeError::InvalidTransaction(format!("unknown asset symbol '{}'", symbol)))?;
            if !value.is_positive() {
                return Err(KazeError::InvalidAmount(format!("{} {} is not positive", value, symbol)));
            }
            Ok(Intent { asset_id, value: *value, script_hash })
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoinSelection {
    pub inputs: Vec<CoinReference>,
    pub change: Vec<TransactionOutput>,
}

/// Pick coins covering `intents` plus `network_fee` (charged in the fee asset).
///
/// Each asset's unspent coins are taken smallest first until the requirement
/// is met. The balance is only read.
pub fn select_coins(balance: &Balance, intents: &[Intent], network_fee: Fixed8) -> KazeResult<CoinSelection> {
    let mut required: Vec<(Hash256, Fixed8)> = Vec::new();
    let mut add = |asset: Hash256, value: Fixed8| -> KazeResult<()> {
        match required.iter_mut().find(|(id, _)| *id == asset) {
            Some((_, total)) => {
                *total = total
                    .checked_add(value)
                    .ok_or_else(|| KazeError::InvalidAmount(format!("required {} overflows", asset_symbol(&asset))))?;
            }
            None => required.push((asset, value)),
        }
        Ok(())
    };
    for intent in intents {
        add(intent.asset_id, intent.value)?;
    }
    if network_fee.is_positive() {
        add(fee_asset_id(), network_fee)?;
    }

    let mut selection = CoinSelection::default();
    for (asset, needed) in required {
        let symbol = asset_symbol(&asset);
        let mut coins = balance.asset(&symbol).map(|l| l.unspent.clone()).unwrap_or_default();
        coins.sort_by_key(|c| c.value);

        let mut selected = Fixed8::ZERO;
        let mut taken = 0;
        for coin in &coins {
            if selected >= needed {
                break;
            }
            selected = selected
                .checked_add(coin.value)
                .ok_or_else(|| KazeError::InvalidAmount(format!("{} coin total overflows", symbol)))?;
            taken += 1;
        }
        if selected < needed {
            return Err(KazeError::InsufficientFunds {
                asset: symbol,
                required: needed,
                available: selected,
            });
        }

        selection.inputs.extend(coins[..taken].iter().map(|c| c.reference()));
        let change = selected - needed;
        if change.is_positive() {
            selection.change.push(TransactionOutput {
                asset_id: asset,
                value: change,
                script_hash: balance.script_hash(),
            });
        }
    }
    Ok(selection)
}

/// Everything the builder may need besides the balance and claims.
#[derive(Debug, Clone, Default)]
pub struct TxTemplate {
    pub intents: Vec<Intent>,
    pub network_fee: Fixed8,
    pub attributes: Vec<TransactionAttribute>,
    /// Invocation script.
    pub script: Vec<u8>,
    /// Gas attached to an invocation.
    pub system_fee: Fixed8,
    pub descriptors: Vec<StateDescriptor>,
}

/// Assemble an unsigned transaction of `kind`.
///
/// On success the transaction is applied to `balance` as unconfirmed. On
/// failure neither `balance` nor `claims` is touched.
pub fn build_transaction(
    kind: TransactionType,
    template: &TxTemplate,
    balance: Option<&mut Balance>,
    claims: Option<&Claims>,
) -> KazeResult<Transaction> {
    let tx = match kind {
        TransactionType::Claim => build_claim(template, claims.ok_or(KazeError::MissingField("claims"))?)?,
        TransactionType::Contract => {
            if template.intents.is_empty() {
                return Err(KazeError::InvalidTransaction("contract transaction needs an intent".to_string()));
            }
            let balance = balance.as_deref().ok_or(KazeError::MissingField("balance"))?;
            let selection = select_coins(balance, &template.intents, template.network_fee)?;
            assemble(TransactionKind::Contract, template, selection)
        }
        TransactionType::Invocation => {
            if template.script.is_empty() {
                return Err(KazeError::InvalidTransaction("invocation needs a script".to_string()));
            }
            if template.system_fee.is_negative() {
                return Err(KazeError::InvalidAmount(format!("system fee {}", template.system_fee)));
            }
            let balance = balance.as_deref().ok_or(KazeError::MissingField("balance"))?;
            let fee = template
                .network_fee
                .checked_add(template.system_fee)
                .ok_or_else(|| KazeError::InvalidAmount("network fee plus system fee overflows".to_string()))?;
            let selection = select_coins(balance, &template.intents, fee)?;
            let kind = TransactionKind::Invocation {
                script: template.script.clone(),
                gas: template.system_fee,
            };
            let mut tx = assemble(kind, template, selection);
            if tx.inputs.is_empty() {
                tx.attributes.push(TransactionAttribute::script(&balance.script_hash()));
            }
            tx
        }
        TransactionType::State => {
            if template.descriptors.is_empty() {
                return Err(KazeError::InvalidTransaction("state transaction needs a descriptor".to_string()));
            }
            let balance = balance.as_deref().ok_or(KazeError::MissingField("balance"))?;
            let selection = select_coins(balance, &template.intents, template.network_fee)?;
            let kind = TransactionKind::State { descriptors: template.descriptors.clone() };
            assemble(kind, template, selection)
        }
    };

    if let Some(balance) = balance {
        balance.apply_transaction(&tx, false);
    }
    tracing::debug!(
        kind = %kind,
        inputs = tx.inputs.len(),
        outputs = tx.outputs.len(),
        "Built transaction"
    );
    Ok(tx)
}

fn build_claim(template: &TxTemplate, claims: &Claims) -> KazeResult<Transaction> {
    if claims.is_empty() {
        return Err(KazeError::EmptyClaims { address: claims.address.clone() });
    }
    let mut tx = Transaction::new(TransactionKind::Claim { claims: claims.references() });
    tx.attributes = template.attributes.clone();
    tx.outputs.push(TransactionOutput {
        asset_id: fee_asset_id(),
        value: claims.total_claimable()?,
        script_hash: claims.script_hash()?,
    });
    Ok(tx)
}

/// Intent outputs in order, then change.
fn assemble(kind: TransactionKind, template: &TxTemplate, selection: CoinSelection) -> Transaction {
    let mut tx = Transaction::new(kind);
    tx.attributes = template.attributes.clone();
    tx.inputs = selection.inputs;
    tx.outputs = template.intents.iter().map(Intent::to_output).collect();
    tx.outputs.extend(selection.change);
    tx
}

/// `Votes` descriptor for `voter` listing `candidates`.
pub fn build_vote_descriptor(voter: &ScriptHash, candidates: &[PublicKey]) -> StateDescriptor {
    let mut w = BinaryWriter::new();
    w.write_var_int(candidates.len() as u64);
    for key in candidates {
        w.write_bytes(&key.to_compressed());
    }
    StateDescriptor {
        kind: StateType::Account,
        key: voter.as_le_bytes().to_vec(),
        field: "Votes".to_string(),
        value: w.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::types::usage;
    use crate::types::{KAZE, STREAM};
    use crate::wallet::balance::AssetInit;
    use crate::wallet::claims::ClaimRecord;
    use crate::wallet::coin::Coin;

    const ADDRESS: &str = "KC74MjETUTAc5qv3fqL1UiyP9DRqeQgWSR";
    const RECIPIENT: &str = "cef0c0fdcfe7838eff6ff104f9cdec2922297537";

    fn units(n: i64) -> Fixed8 {
        Fixed8::from_units(n).unwrap()
    }

    fn coin(txid: Hash256, index: u16, value: Fixed8, owner: ScriptHash) -> Coin {
        Coin { index, txid, value, script_hash: owner }
    }

    fn balance_with(kaze: &[i64], stream: &[i64]) -> Balance {
        let mut balance = Balance::new(ADDRESS, "TestNet").unwrap();
        let me = balance.script_hash();
        let coins = |seed: u8, values: &[i64]| {
            values
                .iter()
                .enumerate()
                .map(|(i, v)| coin(Hash256::from_le_bytes([seed + i as u8; 32]), 0, units(*v), me))
                .collect::<Vec<_>>()
        };
        balance.add_asset(KAZE, AssetInit { balance: None, unspent: coins(1, kaze) }).unwrap();
        balance.add_asset(STREAM, AssetInit { balance: None, unspent: coins(100, stream) }).unwrap();
        balance
    }

    fn pay(symbol: &str, n: i64) -> Intent {
        Intent {
            asset_id: asset_id(symbol).unwrap(),
            value: units(n),
            script_hash: ScriptHash::from_be_hex(RECIPIENT).unwrap(),
        }
    }

    #[test]
    fn test_smallest_sufficient_coin() {
        let balance = balance_with(&[200, 61], &[]);
        let selection = select_coins(&balance, &[pay(KAZE, 1)], Fixed8::ZERO).unwrap();
        assert_eq!(selection.inputs.len(), 1);
        assert_eq!(selection.inputs[0].prev_hash, Hash256::from_le_bytes([2u8; 32]));
        assert_eq!(selection.change.len(), 1);
        assert_eq!(selection.change[0].value, units(60));
        assert_eq!(selection.change[0].script_hash, balance.script_hash());
    }

    #[test]
    fn test_exact_amount_has_no_change() {
        let balance = balance_with(&[5, 5], &[]);
        let selection = select_coins(&balance, &[pay(KAZE, 10)], Fixed8::ZERO).unwrap();
        assert_eq!(selection.inputs.len(), 2);
        assert!(selection.change.is_empty());
    }

    #[test]
    fn test_fee_charged_in_fee_asset() {
        let balance = balance_with(&[10], &[1, 3]);
        let fee: Fixed8 = "0.5".parse().unwrap();
        let selection = select_coins(&balance, &[pay(KAZE, 10)], fee).unwrap();
        assert_eq!(selection.inputs.len(), 2);
        assert_eq!(selection.change.len(), 1);
        assert_eq!(selection.change[0].asset_id, fee_asset_id());
        assert_eq!(selection.change[0].value.to_string(), "0.5");
    }

    #[test]
    fn test_overflowing_requirement_is_invalid_amount() {
        let balance = balance_with(&[5], &[]);
        let mut huge = pay(KAZE, 1);
        huge.value = Fixed8::from_raw(i64::MAX / 2 + 10);
        let err = select_coins(&balance, &[huge.clone(), huge], Fixed8::ZERO).unwrap_err();
        assert!(matches!(err, KazeError::InvalidAmount(_)));
    }

    #[test]
    fn test_empty_intents_select_nothing() {
        let balance = balance_with(&[], &[]);
        assert_eq!(select_coins(&balance, &[], Fixed8::ZERO).unwrap(), CoinSelection::default());
    }

    #[test]
    fn test_insufficient_funds_names_asset_and_leaves_balance() {
        let mut balance = balance_with(&[3], &[1]);
        let before = balance.clone();
        let template = TxTemplate { intents: vec![pay(KAZE, 1), pay(STREAM, 2)], ..Default::default() };
        let err = build_transaction(TransactionType::Contract, &template, Some(&mut balance), None).unwrap_err();
        match err {
            KazeError::InsufficientFunds { asset, required, available } => {
                assert_eq!(asset, STREAM);
                assert_eq!(required, units(2));
                assert_eq!(available, units(1));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(balance, before);
    }

    #[test]
    fn test_contract_matches_wire_vector() {
        let mut balance = Balance::new(ADDRESS, "TestNet").unwrap();
        let prev = Hash256::from_be_hex("9ac9bf9b49c4d2b0a4c5a33c6d8e1f1a2b3c4d5e6f708192a3b4c5d6e7f80910").unwrap();
        let me = balance.script_hash();
        balance.add_asset(KAZE, AssetInit { balance: None, unspent: vec![coin(prev, 3, units(260), me)] }).unwrap();

        let template = TxTemplate { intents: vec![pay(KAZE, 1)], ..Default::default() };
        let tx = build_transaction(TransactionType::Contract, &template, Some(&mut balance), None).unwrap();
        assert_eq!(tx.hash().to_string(), "7cbcfeadb16699abdf166ecd2b47ec73db3d036fd505e3da89b9bbd51adf4070");

        let ledger = balance.asset(KAZE).unwrap();
        assert!(ledger.unspent.is_empty());
        assert_eq!(ledger.spent.len(), 1);
        assert_eq!(ledger.unconfirmed.len(), 1);
        assert_eq!(ledger.unconfirmed[0].value, units(259));
    }

    #[test]
    fn test_outputs_follow_intent_order_then_change() {
        let mut balance = balance_with(&[50], &[]);
        let template = TxTemplate { intents: vec![pay(KAZE, 7), pay(KAZE, 3)], ..Default::default() };
        let tx = build_transaction(TransactionType::Contract, &template, Some(&mut balance), None).unwrap();
        let values: Vec<Fixed8> = tx.outputs.iter().map(|o| o.value).collect();
        assert_eq!(values, vec![units(7), units(3), units(40)]);
    }

    #[test]
    fn test_claim_requires_records() {
        let claims = Claims::new(ADDRESS, "TestNet", Vec::new());
        let err = build_transaction(TransactionType::Claim, &TxTemplate::default(), None, Some(&claims)).unwrap_err();
        assert!(matches!(err, KazeError::EmptyClaims { .. }));
    }

    #[test]
    fn test_claim_single_stream_output() {
        let records = (1..=2u8)
            .map(|i| ClaimRecord {
                index: 0,
                txid: Hash256::from_le_bytes([i; 32]),
                start: 1,
                end: 5,
                claim: "0.25".parse().unwrap(),
                value: units(10),
            })
            .collect();
        let claims = Claims::new(ADDRESS, "TestNet", records);
        let mut balance = balance_with(&[], &[]);
        let tx = build_transaction(TransactionType::Claim, &TxTemplate::default(), Some(&mut balance), Some(&claims))
            .unwrap();

        assert!(tx.inputs.is_empty());
        assert!(matches!(&tx.kind, TransactionKind::Claim { claims } if claims.len() == 2));
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.outputs[0].asset_id, fee_asset_id());
        assert_eq!(tx.outputs[0].value.to_string(), "0.5");
        assert_eq!(balance.asset(STREAM).unwrap().unconfirmed.len(), 1);
    }

    #[test]
    fn test_invocation_without_inputs_names_sender() {
        let mut balance = balance_with(&[], &[]);
        let template = TxTemplate { script: vec![0x51], ..Default::default() };
        let tx = build_transaction(TransactionType::Invocation, &template, Some(&mut balance), None).unwrap();
        assert_eq!(tx.version, 1);
        assert_eq!(tx.attributes.len(), 1);
        assert_eq!(tx.attributes[0].usage(), usage::SCRIPT);
        assert_eq!(tx.attributes[0].script_hash(), Some(balance.script_hash()));
    }

    #[test]
    fn test_invocation_pays_system_fee() {
        let mut balance = balance_with(&[], &[2]);
        let template = TxTemplate { script: vec![0x51], system_fee: units(1), ..Default::default() };
        let tx = build_transaction(TransactionType::Invocation, &template, Some(&mut balance), None).unwrap();
        assert_eq!(tx.inputs.len(), 1);
        assert!(tx.attributes.is_empty());
        assert!(matches!(tx.kind, TransactionKind::Invocation { gas, .. } if gas == units(1)));
        assert_eq!(tx.outputs[0].value, units(1));
    }

    #[test]
    fn test_kind_preconditions() {
        let mut balance = balance_with(&[1], &[]);
        let empty = TxTemplate::default();
        for kind in [TransactionType::Contract, TransactionType::Invocation, TransactionType::State] {
            assert!(matches!(
                build_transaction(kind, &empty, Some(&mut balance), None),
                Err(KazeError::InvalidTransaction(_))
            ));
        }
    }

    #[test]
    fn test_vote_descriptor_layout() {
        let voter = ScriptHash::from_be_hex(RECIPIENT).unwrap();
        let key = PublicKey::from_hex("031d8e1630ce640966967bc6d95223d21f44304133003140c3b52004dc981349c9").unwrap();
        let descriptor = build_vote_descriptor(&voter, &[key]);
        assert_eq!(descriptor.kind, StateType::Account);
        assert_eq!(hex::encode(&descriptor.key), "3775292229eccdf904f16fff8e83e7cffdc0f0ce");
        assert_eq!(descriptor.field, "Votes");
        assert_eq!(descriptor.value.len(), 1 + 33);
        assert_eq!(descriptor.value[0], 1);
        assert_eq!(descriptor.account(), Some(voter));
    }

    #[test]
    fn test_make_intents() {
        let intents = make_intents(&[(KAZE, units(2)), ("stream", "0.1".parse().unwrap())], ADDRESS).unwrap();
        assert_eq!(intents.len(), 2);
        assert_eq!(intents[1].asset_id, fee_asset_id());
        assert!(make_intents(&[("DOGE", units(1))], ADDRESS).is_err());
        assert!(make_intents(&[(KAZE, Fixed8::ZERO)], ADDRESS).is_err());
    }
}
