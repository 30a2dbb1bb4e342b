//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → listener, upgrade limits and timeouts fixed at startup
//!     → nodes seed the registry
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → node table swapped atomically, everything else unchanged
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only the node table is hot-reloadable

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    DeadEndPolicy, ListenerConfig, NodeConfig, ObservabilityConfig, ProxyConfig, TimeoutConfig,
    UpgradeConfig,
};
pub use validation::ValidationError;
