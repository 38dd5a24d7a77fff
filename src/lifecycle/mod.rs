//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Logging → Metrics → Access store → Facade (reconcile, auto-start) → Admin API
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Reconcile access lists into the relay config
//!
//! Shutdown (shutdown.rs):
//!     Broadcast → Admin API drains → Relay stopped → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then the relay, then the admin listener
//! - The relay is stopped last, after the admin API stops taking requests

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
