//! Resilience helpers.
//!
//! # Design Decisions
//! - Restart delays grow exponentially with a small jitter, capped at a maximum
//! - The supervisor's restart policy is the only caller; nothing else retries

pub mod backoff;

pub use backoff::calculate_backoff;
