//! Node discovery subsystem.
//!
//! # Data Flow
//! ```text
//! Provider node list
//!     → discovery.rs (sort by height, https filter, freshness window)
//!     → cached endpoint still fast? reuse it
//!     → otherwise race.rs (ping every candidate, first success wins)
//!     → EndpointCache updated per (provider, network)
//! ```
//!
//! # Design Decisions
//! - Freshness is relative to the tallest node: one block of lag is tolerated
//! - The cache is shared process-wide and keyed per provider and network
//! - Late ping results are dropped once a winner is known

pub mod discovery;
pub mod race;

pub use discovery::{discover, eligible_nodes, DiscoveryPolicy, EndpointCache};
pub use race::race_to_success;
