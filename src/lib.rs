//! Nostr relay supervisor and access-list manager.

pub mod access;
pub mod admin;
pub mod config;
pub mod facade;
pub mod lifecycle;
pub mod observability;
pub mod relay_config;
pub mod resilience;
pub mod supervisor;

pub use config::ManagerConfig;
pub use facade::{FacadeError, SupervisorFacade};
pub use lifecycle::Shutdown;
