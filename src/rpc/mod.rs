//! Node RPC subsystem.
//!
//! # Data Flow
//! ```text
//! Ledger verify / discovery ping / pipeline submit
//!     → client.rs (JSON-RPC 2.0 framing)
//!     → net::Transport (POST with timeout)
//!     → node
//! ```

pub mod client;

pub use client::{ContractState, InvokeResult, RpcClient, RpcResponse, StackItem, TxOut};
