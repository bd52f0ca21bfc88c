//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Provider adapter / RPC client
//!     → transport.rs (GET or POST, JSON in and out)
//!     → resilience::timeouts (deadline per request)
//!     → remote API or node
//! ```
//!
//! # Design Decisions
//! - One trait seam for all HTTP; nothing above it sees reqwest types
//! - Non-2xx statuses are transport failures, bodies are always JSON

pub mod transport;

pub use transport::{HttpTransport, Transport};
