//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SyncConfig (validated, immutable)
//!     → passed by reference into the orchestrator for one run
//! ```
//!
//! # Design Decisions
//! - Config is immutable for the duration of a run
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ApplyOrderConfig, Features, InstanceConfig, LogFormat, ObservabilityConfig, RunConfig,
    SyncConfig,
};
pub use validation::ValidationError;
