//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Provider / RPC / ping call:
//!     → timeouts.rs (enforce request or ping deadline)
//!     → On failure: load_balancer::router (one same-call failover)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No automatic retries; retry policy belongs to the caller

pub mod timeouts;

pub use timeouts::with_timeout;
