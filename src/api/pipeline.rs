//! Request enrichment pipeline.
//!
//! # Responsibilities
//! - Fill whatever the caller left out (endpoint, keys, balance, claims)
//! - Build, sign and submit one transaction per request
//! - Record the lifecycle stage on the request as it advances
//!
//! Each step skips itself when its output is already present, so a caller
//! can resume a failed request by calling the composed operation again.

use std::sync::Arc;
use std::time::Duration;

use crate::config::KazeConfig;
use crate::health::race::race_to_success;
use crate::load_balancer::{AccessRouter, RouterState};
use crate::net::{HttpTransport, Transport};
use crate::observability::metrics;
use crate::provider::{Kazescan, KryptonDb, Provider};
use crate::resilience::with_timeout;
use crate::rpc::RpcClient;
use crate::tx::builder::{build_transaction, build_vote_descriptor, Intent, TxTemplate};
use crate::tx::script::{ContractParam, ScriptBuilder};
use crate::tx::signing::{required_signers, sign_transaction, signing_state, SignOptions, Signer};
use crate::tx::types::{
    StateDescriptor, Transaction, TransactionAttribute, TransactionKind, TransactionType, TxLifecycle, Witness,
};
use crate::types::{Hash256, KazeError, KazeResult, ScriptHash};
use crate::wallet::account::{address_from_script_hash, Account, PublicKey};
use crate::wallet::balance::Balance;
use crate::wallet::claims::Claims;
use crate::wallet::fixed8::Fixed8;

/// Invocation payload: raw bytes or a contract call to assemble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationScript {
    Raw(Vec<u8>),
    Call {
        script_hash: ScriptHash,
        operation: Option<String>,
        args: Vec<ContractParam>,
    },
}

impl InvocationScript {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            InvocationScript::Raw(bytes) => bytes.clone(),
            InvocationScript::Call { script_hash, operation, args } => {
                let mut sb = ScriptBuilder::new();
                sb.emit_app_call(script_hash, operation.as_deref(), args);
                sb.into_bytes()
            }
        }
    }
}

/// Node acknowledgement of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub result: bool,
    pub txid: Hash256,
}

/// Mutable context threaded through the pipeline steps.
#[derive(Debug, Default)]
pub struct TxRequest {
    pub net: String,
    /// RPC node the transaction is submitted to.
    pub url: Option<String>,
    pub address: Option<String>,
    pub account: Option<Account>,
    pub signer: Option<Signer>,
    pub balance: Option<Balance>,
    pub claims: Option<Claims>,
    pub intents: Vec<Intent>,
    pub fees: Fixed8,
    pub script: Option<InvocationScript>,
    pub gas: Fixed8,
    pub attributes: Vec<TransactionAttribute>,
    /// Vote candidates for a state transaction.
    pub candidates: Vec<PublicKey>,
    pub descriptors: Vec<StateDescriptor>,
    /// Spend coins owned by this contract instead of the signer's own.
    pub smart_contract_sender: Option<ScriptHash>,
    pub tx: Option<Transaction>,
    pub stage: TxLifecycle,
    pub response: Option<SubmitOutcome>,
}

impl TxRequest {
    pub fn new(net: &str) -> Self {
        Self { net: net.to_string(), ..Default::default() }
    }

    pub fn with_account(mut self, account: Account) -> Self {
        self.account = Some(account);
        self
    }

    pub fn with_signer(mut self, signer: Signer) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn with_balance(mut self, balance: Balance) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn with_claims(mut self, claims: Claims) -> Self {
        self.claims = Some(claims);
        self
    }

    pub fn with_intents(mut self, intents: Vec<Intent>) -> Self {
        self.intents = intents;
        self
    }

    pub fn with_fees(mut self, fees: Fixed8) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_script(mut self, script: InvocationScript, gas: Fixed8) -> Self {
        self.script = Some(script);
        self.gas = gas;
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<PublicKey>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_smart_contract_sender(mut self, contract: ScriptHash) -> Self {
        self.smart_contract_sender = Some(contract);
        self
    }

    /// Address whose coins fund the transaction.
    /// Record that a submitted transaction made it into a block. Its outputs
    /// move from unconfirmed to unspent.
    pub fn confirm(&mut self) -> KazeResult<()> {
        match self.stage {
            TxLifecycle::Confirmed => Ok(()),
            TxLifecycle::Submitted => {
                if let Some(balance) = self.balance.as_mut() {
                    balance.confirm();
                }
                self.stage = TxLifecycle::Confirmed;
                Ok(())
            }
            stage => Err(KazeError::InvalidTransaction(format!("cannot confirm a {:?} transaction", stage))),
        }
    }

    pub(crate) fn funding_address(&self) -> KazeResult<String> {
        match &self.smart_contract_sender {
            Some(contract) => Ok(address_from_script_hash(contract)),
            None => self.address.clone().ok_or(KazeError::MissingField("address")),
        }
    }
}

/// Orchestrates provider lookups, building, signing and submission.
#[derive(Debug)]
pub struct Pipeline<A, B, T> {
    router: AccessRouter<A, B>,
    transport: T,
    config: Arc<KazeConfig>,
}

impl Pipeline<Kazescan<HttpTransport>, KryptonDb<HttpTransport>, HttpTransport> {
    /// HTTP pipeline with kazescan in slot A and kryptonDB in slot B.
    pub fn http(config: Arc<KazeConfig>) -> Self {
        let transport = HttpTransport::new(Duration::from_millis(config.timeouts.request_ms));
        let state = Arc::new(RouterState::new(&config.router));
        let router = AccessRouter::new(
            Kazescan::new(transport.clone(), config.clone(), state.endpoints().clone()),
            KryptonDb::new(transport.clone(), config.clone(), state.endpoints().clone()),
            state,
        );
        Self::new(router, transport, config)
    }
}

impl<A: Provider, B: Provider, T: Transport> Pipeline<A, B, T> {
    pub fn new(router: AccessRouter<A, B>, transport: T, config: Arc<KazeConfig>) -> Self {
        Self { router, transport, config }
    }

    pub fn router(&self) -> &AccessRouter<A, B> {
        &self.router
    }

    pub fn rpc(&self, url: &str) -> RpcClient<&T> {
        RpcClient::new(&self.transport, url)
    }

    /// Discover an RPC node. When both providers fail, race the network's seed nodes.
    pub async fn fill_url(&self, req: &mut TxRequest) -> KazeResult<()> {
        if req.url.is_some() {
            return Ok(());
        }
        match self.router.discover_best_node(&req.net).await {
            Ok(url) => {
                req.url = Some(url);
                Ok(())
            }
            Err(e) => {
                let seeds = self.config.network(&req.net).map(|n| n.nodes.clone()).unwrap_or_default();
                if seeds.is_empty() {
                    return Err(e);
                }
                tracing::warn!(net = %req.net, error = %e, seeds = seeds.len(), "Discovery failed, pinging seed nodes");
                req.url = Some(self.fastest_seed(&seeds).await?);
                Ok(())
            }
        }
    }

    async fn fastest_seed(&self, seeds: &[String]) -> KazeResult<String> {
        let ping = Duration::from_millis(self.config.timeouts.ping_ms);
        let pings = seeds.iter().map(move |url| async move {
            with_timeout(ping, self.rpc(url).ping()).await?;
            Ok::<_, KazeError>(url.clone())
        });
        race_to_success(pings)
            .await
            .map_err(|errors| KazeError::NoEligibleNodes(format!("{} seed nodes unreachable", errors.len())))
    }

    /// Derive address and signer from the account, or address from the signer.
    pub fn fill_keys(&self, req: &mut TxRequest) -> KazeResult<()> {
        if let Some(account) = &req.account {
            if req.address.is_none() {
                req.address = Some(account.address().to_string());
            }
            if req.signer.is_none() {
                if let Ok(key) = account.private_key() {
                    req.signer = Some(Signer::LocalKey(key.clone()));
                }
            }
        }
        if req.address.is_none() {
            if let Some(signer) = &req.signer {
                req.address = Some(address_from_script_hash(&signer.script_hash()));
            }
        }
        if req.address.is_none() {
            return Err(KazeError::MissingField("address"));
        }
        Ok(())
    }

    pub async fn fill_balance(&self, req: &mut TxRequest) -> KazeResult<()> {
        if req.balance.is_some() {
            return Ok(());
        }
        let address = req.funding_address()?;
        req.balance = Some(self.router.get_balance(&req.net, &address).await?);
        Ok(())
    }

    pub async fn fill_claims(&self, req: &mut TxRequest) -> KazeResult<()> {
        if req.claims.is_some() {
            return Ok(());
        }
        let address = req.address.clone().ok_or(KazeError::MissingField("address"))?;
        req.claims = Some(self.router.get_claims(&req.net, &address).await?);
        Ok(())
    }

    /// Vote descriptor from the candidate list, unless descriptors were supplied.
    pub fn build_descriptors(&self, req: &mut TxRequest) -> KazeResult<()> {
        if !req.descriptors.is_empty() {
            return Ok(());
        }
        if req.candidates.is_empty() {
            return Err(KazeError::MissingField("candidates"));
        }
        let voter = match &req.account {
            Some(account) => account.script_hash(),
            None => req.signer.as_ref().ok_or(KazeError::MissingField("account"))?.script_hash(),
        };
        req.descriptors = vec![build_vote_descriptor(&voter, &req.candidates)];
        Ok(())
    }

    pub fn create_tx(&self, req: &mut TxRequest, kind: TransactionType) -> KazeResult<()> {
        if req.tx.is_some() {
            return Ok(());
        }
        let mut attributes = req.attributes.clone();
        if req.smart_contract_sender.is_some() {
            // The contract cannot sign, so the caller must.
            let signer = req.signer.as_ref().ok_or(KazeError::KeyUnavailable("signer"))?;
            attributes.push(TransactionAttribute::script(&signer.script_hash()));
        }
        let template = TxTemplate {
            intents: req.intents.clone(),
            network_fee: req.fees,
            attributes,
            script: req.script.as_ref().map(InvocationScript::to_bytes).unwrap_or_default(),
            system_fee: req.gas,
            descriptors: req.descriptors.clone(),
        };
        let tx = build_transaction(kind, &template, req.balance.as_mut(), req.claims.as_ref())?;
        tracing::info!(net = %req.net, kind = %kind, txid = %tx.hash(), "Created transaction");
        req.tx = Some(tx);
        req.stage = TxLifecycle::Unsigned;
        Ok(())
    }

    pub async fn sign_tx(&self, req: &mut TxRequest) -> KazeResult<()> {
        if !matches!(req.stage, TxLifecycle::Unsigned | TxLifecycle::PartiallySigned) {
            return Ok(());
        }
        let signer = req.signer.as_ref().ok_or(KazeError::KeyUnavailable("signer"))?;
        let tx = req.tx.as_mut().ok_or(KazeError::MissingField("tx"))?;
        let options = SignOptions {
            required_signers: required_signers(tx, req.balance.as_ref(), req.claims.as_ref()),
            allow_foreign_sender: req.smart_contract_sender.is_some(),
        };
        req.stage = sign_transaction(tx, signer, &options).await?;
        Ok(())
    }

    /// Witness for a contract spending its own coins: empty invocation plus
    /// the contract's verification script.
    pub async fn attach_contract_witness(&self, req: &mut TxRequest) -> KazeResult<()> {
        let Some(contract) = req.smart_contract_sender else {
            return Ok(());
        };
        if req.tx.as_ref().is_some_and(|tx| tx.witness_hashes().contains(&contract)) {
            return Ok(());
        }
        let url = req.url.clone().ok_or(KazeError::MissingField("url"))?;
        let state = self.rpc(&url).get_contract_state(&contract).await?;
        let tx = req.tx.as_mut().ok_or(KazeError::MissingField("tx"))?;
        tx.add_witness(Witness { invocation: vec![0x00, 0x00], verification: state.script });
        let required = required_signers(tx, req.balance.as_ref(), req.claims.as_ref());
        req.stage = signing_state(tx, &required);
        tracing::debug!(contract = %contract, stage = ?req.stage, "Attached contract witness");
        Ok(())
    }

    pub async fn send_tx(&self, req: &mut TxRequest) -> KazeResult<SubmitOutcome> {
        if req.stage != TxLifecycle::FullySigned {
            return Err(KazeError::InvalidTransaction(format!("cannot submit a {:?} transaction", req.stage)));
        }
        let url = req.url.clone().ok_or(KazeError::MissingField("url"))?;
        let tx = req.tx.as_ref().ok_or(KazeError::MissingField("tx"))?;
        let txid = tx.hash();

        let accepted = self.rpc(&url).send_raw_transaction(tx).await?;
        metrics::record_submission(accepted);
        if !accepted {
            req.stage = TxLifecycle::Rejected;
            tracing::error!(net = %req.net, url = %url, txid = %txid, raw = %tx.to_hex(), "Transaction rejected");
            return Err(KazeError::SubmissionRejected { txid: txid.to_string() });
        }

        if let (TransactionKind::Claim { .. }, Some(claims)) = (&tx.kind, req.claims.as_mut()) {
            claims.apply_claim(tx);
        }
        req.stage = TxLifecycle::Submitted;
        let outcome = SubmitOutcome { result: true, txid };
        req.response = Some(outcome);
        tracing::info!(net = %req.net, url = %url, txid = %txid, "Transaction submitted");
        Ok(outcome)
    }

    /// Contract transaction paying the request's intents.
    pub async fn send_asset(&self, req: &mut TxRequest) -> KazeResult<SubmitOutcome> {
        self.fill_url(req).await?;
        self.fill_keys(req)?;
        self.fill_balance(req).await?;
        self.create_tx(req, TransactionType::Contract)?;
        self.sign_tx(req).await?;
        self.attach_contract_witness(req).await?;
        self.send_tx(req).await
    }

    /// Claim every available STREAM for the request's address.
    pub async fn claim_stream(&self, req: &mut TxRequest) -> KazeResult<SubmitOutcome> {
        self.fill_keys(req)?;
        self.fill_claims(req).await?;
        if let Some(claims) = req.claims.as_ref().filter(|c| c.is_empty()) {
            return Err(KazeError::EmptyClaims { address: claims.address.clone() });
        }
        self.fill_url(req).await?;
        self.create_tx(req, TransactionType::Claim)?;
        self.sign_tx(req).await?;
        self.send_tx(req).await
    }

    /// Invocation transaction running the request's script.
    pub async fn do_invoke(&self, req: &mut TxRequest) -> KazeResult<SubmitOutcome> {
        self.fill_url(req).await?;
        self.fill_keys(req)?;
        self.fill_balance(req).await?;
        self.create_tx(req, TransactionType::Invocation)?;
        self.sign_tx(req).await?;
        self.attach_contract_witness(req).await?;
        self.send_tx(req).await
    }

    /// State transaction registering the request's votes.
    pub async fn setup_vote(&self, req: &mut TxRequest) -> KazeResult<SubmitOutcome> {
        self.fill_url(req).await?;
        self.fill_keys(req)?;
        self.fill_balance(req).await?;
        self.build_descriptors(req)?;
        self.create_tx(req, TransactionType::State)?;
        self.sign_tx(req).await?;
        self.send_tx(req).await
    }
}
