//! Provider load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Provider call (balance, claims, history, ...)
//!     → switch.rs (roll against the routing weight → slot A or B)
//!     → router.rs (invoke the chosen provider)
//!         success → nudge weight toward it
//!         failure → nudge toward the other, call it once
//!     → value, or ProviderError from the fallback
//! ```
//!
//! # Design Decisions
//! - One weight in [0, 1]: the probability of routing to slot B
//! - A degraded provider is avoided progressively, never excluded
//! - Freezing stops nudging but not routing
//! - Failover is sequential within a call; the fallback never nudges

pub mod router;
pub mod switch;

pub use router::{AccessRouter, Routed};
pub use switch::{RouterState, Slot};
