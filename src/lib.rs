//! Light client engine for the KAZE UTXO chain.

pub mod api;
pub mod config;
pub mod health;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod provider;
pub mod resilience;
pub mod rpc;
pub mod tx;
pub mod types;
pub mod wallet;

pub use api::{InvocationScript, Pipeline, SubmitOutcome, TxRequest};
pub use config::KazeConfig;
pub use load_balancer::{AccessRouter, RouterState};
pub use provider::{Kazescan, KryptonDb, Provider, ProviderKind};
pub use types::{KazeError, KazeResult};
