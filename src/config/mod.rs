//! Manager configuration subsystem.
//!
//! # Data Flow
//! ```text
//! manager.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ManagerConfig (validated, immutable)
//!     → supervisor settings, access store path, admin + observability setup
//! ```
//!
//! # Design Decisions
//! - This is the manager's own config; the relay's file lives in `relay_config`
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::ManagerConfig;
pub use schema::{AccessConfig, AdminConfig, ObservabilityConfig, RelayProcessConfig, RestartConfig, SupervisorConfig};
