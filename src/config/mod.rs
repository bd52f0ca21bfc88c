//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! kaze.toml
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → KazeConfig (validated, immutable)
//!     → shared via Arc with providers, router and pipeline
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - A network name with no entry is treated as a literal provider URL

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{KazeConfig, NetworkConfig, ObservabilityConfig, RouterConfig, TimeoutConfig};
pub use validation::ValidationError;
