//! Access list entries, modes and identifier validation.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of a hex-encoded public key.
const PUBKEY_HEX_LEN: usize = 64;

/// Relay admission policy. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    #[default]
    Open,
    Whitelist,
    Blacklist,
    Paid,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessMode::Open => "open",
            AccessMode::Whitelist => "whitelist",
            AccessMode::Blacklist => "blacklist",
            AccessMode::Paid => "paid",
        };
        f.write_str(name)
    }
}

impl FromStr for AccessMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(AccessMode::Open),
            "whitelist" => Ok(AccessMode::Whitelist),
            "blacklist" => Ok(AccessMode::Blacklist),
            "paid" => Ok(AccessMode::Paid),
            other => Err(ValidationError::InvalidMode(other.to_string())),
        }
    }
}

/// Which list an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Whitelist,
    Blacklist,
}

impl ListKind {
    pub fn opposite(self) -> Self {
        match self {
            ListKind::Whitelist => ListKind::Blacklist,
            ListKind::Blacklist => ListKind::Whitelist,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ListKind::Whitelist => "whitelist",
            ListKind::Blacklist => "blacklist",
        }
    }
}

/// A stored list member.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AccessEntry {
    /// Lowercase hex public key.
    pub pubkey: String,
    /// Seconds since epoch when the key first joined the list.
    pub added_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A submitted list member, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EntryRequest {
    pub pubkey: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl From<&str> for EntryRequest {
    fn from(pubkey: &str) -> Self {
        Self {
            pubkey: pubkey.to_string(),
            note: None,
        }
    }
}

impl From<String> for EntryRequest {
    fn from(pubkey: String) -> Self {
        Self { pubkey, note: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid public keys: {}", .0.join(", "))]
    InvalidPubkeys(Vec<String>),

    #[error("invalid access mode: {0}")]
    InvalidMode(String),
}

/// Check that `pubkey` is 64 hex characters.
pub fn is_valid_pubkey(pubkey: &str) -> bool {
    pubkey.len() == PUBKEY_HEX_LEN && pubkey.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Validate a whole submission. Either every entry is valid or nothing is
/// returned; duplicates collapse onto their first occurrence.
pub fn validate_entries(requests: &[EntryRequest]) -> Result<Vec<AccessEntry>, ValidationError> {
    let now = unix_now();
    let mut invalid = Vec::new();
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(requests.len());

    for request in requests {
        let pubkey = request.pubkey.trim();
        if !is_valid_pubkey(pubkey) {
            invalid.push(request.pubkey.clone());
            continue;
        }
        let pubkey = pubkey.to_ascii_lowercase();
        if seen.insert(pubkey.clone()) {
            entries.push(AccessEntry {
                pubkey,
                added_at: now,
                note: request.note.clone(),
            });
        }
    }

    if invalid.is_empty() {
        Ok(entries)
    } else {
        Err(ValidationError::InvalidPubkeys(invalid))
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
