//! Access control subsystem.
//!
//! # Data Flow
//! ```text
//! admin change (whitelist / blacklist / mode)
//!     → entry.rs (validate every identifier, all-or-nothing)
//!     → store.rs (one database transaction, system of record)
//!     → sync.rs (project store state into relay config under its write lock)
//!     → ReloadNotifier (relay re-reads config, caller not blocked)
//!
//! At startup and after a partial failure:
//!     sync.rs reconcile → relay config lists := database lists
//! ```
//!
//! # Design Decisions
//! - The database always wins; the relay config is a derived projection
//! - A key lives in at most one list; writing it to one removes it from the other
//! - Switching mode never deletes a list

pub mod entry;
pub mod store;
pub mod sync;

pub use entry::{AccessEntry, AccessMode, EntryRequest, ListKind, ValidationError};
pub use store::{AccessListStore, AccessSnapshot, JsonAccessStore, MemoryAccessStore, StoreError};
pub use sync::{AccessListSynchronizer, ReloadNotifier, SyncError};
