//! Relay configuration subsystem.
//!
//! # Data Flow
//! ```text
//! relay config.toml
//!     → store.rs (shared lock, read + parse)
//!     → document.rs (typed sections + residual tables)
//!     → caller mutates a copy
//!     → store.rs (exclusive lock, temp file + rename)
//!     → relay re-reads on reload signal
//! ```
//!
//! # Design Decisions
//! - Unknown keys and sections round-trip untouched
//! - The file is replaced by rename, never rewritten in place
//! - A missing file is an error here; defaults are the facade's call

pub mod document;
pub mod store;

pub use document::RelayDocument;
pub use store::{ConfigStore, ConfigStoreError};
