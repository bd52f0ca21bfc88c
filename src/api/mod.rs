//! Transaction pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! TxRequest (whatever the caller knows)
//!     → fill_url      (AccessRouter discovery, seed nodes as last resort)
//!     → fill_keys     (address and signer from the account)
//!     → fill_balance / fill_claims (AccessRouter)
//!     → build_descriptors (votes)
//!     → create_tx     (tx::builder, balance updated as unconfirmed)
//!     → sign_tx       (tx::signing, contract witness when sending as a contract)
//!     → send_tx       (rpc sendrawtransaction)
//!     → SubmitOutcome { result, txid }
//!
//! kep5 token reads: one invokescript, results read off the VM stack
//! kep5 transfer_token: `transfer` contract call → do_invoke
//! ```
//!
//! # Design Decisions
//! - Steps skip themselves when their output is already on the request
//! - The pipeline never retries; the first failing step's error is returned
//! - The request records its lifecycle stage so callers can inspect or resume it

pub mod kep5;
pub mod pipeline;

pub use kep5::{Token, TokenInfo};
pub use pipeline::{InvocationScript, Pipeline, SubmitOutcome, TxRequest};
