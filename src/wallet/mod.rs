//! Wallet subsystem: keys, amounts and the coin ledger.
//!
//! # Data Flow
//! ```text
//! key material (WIF / hex / address)
//!     → account.rs (derivation chain, multisig)
//!     → crypto.rs (hash160, base58check, P-256)
//!
//! provider response
//!     → balance.rs + coin.rs (unspent / spent / unconfirmed)
//!     → claims.rs (claimable stream records)
//!     → tx::builder borrows both, mutates the balance on success
//!
//! Coin states:
//!     unconfirmed → unspent → spent
//! ```
//!
//! # Design Decisions
//! - Amounts are `Fixed8` everywhere; no floating point crosses a boundary
//! - Private keys never appear in `Debug` output or logs
//! - Only `Balance::verify` performs network I/O

pub mod account;
pub mod balance;
pub mod claims;
pub mod coin;
pub mod crypto;
pub mod fixed8;

pub use account::{Account, MultiSig, PrivateKey, PublicKey};
pub use balance::{AssetInit, Balance};
pub use claims::{ClaimRecord, Claims};
pub use coin::{AssetLedger, Coin};
pub use fixed8::Fixed8;
