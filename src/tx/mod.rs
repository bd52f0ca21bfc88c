//! Transaction subsystem.
//!
//! # Data Flow
//! ```text
//! Intents + Balance + Claims
//!     → builder.rs (coin selection, per-kind assembly)
//!     → types.rs (Transaction, wire layout, hash)
//!     → signing.rs (witnesses in ascending script-hash order)
//!     → codec.rs (varint / little-endian primitives)
//!
//! Lifecycle:
//!     Draft → Unsigned → PartiallySigned → FullySigned → Submitted → Confirmed | Rejected
//! ```
//!
//! # Design Decisions
//! - Transaction kinds are a closed enum; no string dispatch
//! - `deserialize` is the exact inverse of `serialize`
//! - Builder failures never touch the caller's balance

pub mod builder;
pub mod codec;
pub mod script;
pub mod signing;
pub mod types;

pub use builder::{build_transaction, build_vote_descriptor, make_intents, select_coins, Intent, TxTemplate};
pub use signing::{sign_transaction, verify_witness, ExternalSigner, MultiSigCollector, SignOptions, Signer};
pub use types::{Transaction, TransactionKind, TransactionType, TxLifecycle, Witness};
