//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Providers, router, discovery, pipeline:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → whatever subscriber / recorder the embedding process installs
//! ```
//!
//! # Design Decisions
//! - Key/value fields on every event, never key material
//! - The library installs no metrics exporter

pub mod logging;
pub mod metrics;
