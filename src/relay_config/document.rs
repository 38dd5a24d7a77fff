//! Typed view of the relay's TOML configuration file.
//!
//! Every section keeps the keys it does not model in a flattened `extra`
//! table, and the root keeps unknown sections the same way. Modeled scalars
//! are optional and only written back when present, so a document that is
//! read and written again without changes keeps exactly the keys it had.

use serde::{Deserialize, Serialize};
use toml::Table;

use crate::access::entry::AccessMode;

/// The relay's full configuration document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RelayDocument {
    #[serde(default, skip_serializing_if = "InfoSection::is_empty")]
    pub info: InfoSection,

    #[serde(default, skip_serializing_if = "DatabaseSection::is_empty")]
    pub database: DatabaseSection,

    #[serde(default, skip_serializing_if = "NetworkSection::is_empty")]
    pub network: NetworkSection,

    #[serde(default, skip_serializing_if = "LimitsSection::is_empty")]
    pub limits: LimitsSection,

    #[serde(default, skip_serializing_if = "AuthorizationSection::is_empty")]
    pub authorization: AuthorizationSection,

    #[serde(default, skip_serializing_if = "LoggingSection::is_empty")]
    pub logging: LoggingSection,

    /// Sections this crate does not model.
    #[serde(flatten)]
    pub extra: Table,
}

/// Relay identity published in the NIP-11 information document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InfoSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(flatten)]
    pub extra: Table,
}

/// Event storage location.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DatabaseSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(flatten)]
    pub extra: Table,
}

/// Listener bind settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct NetworkSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(flatten)]
    pub extra: Table,
}

/// Rate and size limits enforced by the relay.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LimitsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_per_sec: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriptions_per_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_event_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ws_message_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ws_frame_bytes: Option<u64>,
    #[serde(flatten)]
    pub extra: Table,
}

/// Who may publish to the relay.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AuthorizationSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_mode: Option<AccessMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubkey_whitelist: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubkey_blacklist: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Table,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LoggingSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_prefix: Option<String>,
    #[serde(flatten)]
    pub extra: Table,
}

impl InfoSection {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl DatabaseSection {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl NetworkSection {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl LimitsSection {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl AuthorizationSection {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl LoggingSection {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Unmodeled keys captured from a document, per section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Residuals {
    root: Table,
    info: Table,
    database: Table,
    network: Table,
    limits: Table,
    authorization: Table,
    logging: Table,
}

impl RelayDocument {
    /// Document written when the relay has no configuration file yet.
    pub fn with_defaults() -> Self {
        Self {
            info: InfoSection {
                relay_url: Some("ws://localhost:8080/".to_string()),
                name: Some("nostr relay".to_string()),
                description: Some("A managed nostr relay".to_string()),
                ..Default::default()
            },
            database: DatabaseSection {
                data_directory: Some(".".to_string()),
                engine: Some("sqlite".to_string()),
                ..Default::default()
            },
            network: NetworkSection {
                address: Some("0.0.0.0".to_string()),
                port: Some(8080),
                ..Default::default()
            },
            limits: LimitsSection {
                messages_per_sec: Some(5),
                subscriptions_per_min: Some(60),
                max_event_bytes: Some(131_072),
                max_ws_message_bytes: Some(131_072),
                max_ws_frame_bytes: Some(131_072),
                ..Default::default()
            },
            authorization: AuthorizationSection {
                access_mode: Some(AccessMode::Open),
                pubkey_whitelist: Some(Vec::new()),
                pubkey_blacklist: Some(Vec::new()),
                ..Default::default()
            },
            logging: LoggingSection::default(),
            extra: Table::new(),
        }
    }

    /// Snapshot of every key this document carries but does not model.
    pub fn residuals(&self) -> Residuals {
        Residuals {
            root: self.extra.clone(),
            info: self.info.extra.clone(),
            database: self.database.extra.clone(),
            network: self.network.extra.clone(),
            limits: self.limits.extra.clone(),
            authorization: self.authorization.extra.clone(),
            logging: self.logging.extra.clone(),
        }
    }

    /// Re-attach residual keys the document is missing. Keys already present
    /// in the document win.
    pub fn absorb_residuals(&mut self, residuals: &Residuals) {
        merge_missing(&mut self.extra, &residuals.root);
        merge_missing(&mut self.info.extra, &residuals.info);
        merge_missing(&mut self.database.extra, &residuals.database);
        merge_missing(&mut self.network.extra, &residuals.network);
        merge_missing(&mut self.limits.extra, &residuals.limits);
        merge_missing(&mut self.authorization.extra, &residuals.authorization);
        merge_missing(&mut self.logging.extra, &residuals.logging);
    }

    /// Active access mode, `open` when the file does not name one.
    pub fn access_mode(&self) -> AccessMode {
        self.authorization.access_mode.unwrap_or_default()
    }

    pub fn whitelist(&self) -> &[String] {
        self.authorization.pubkey_whitelist.as_deref().unwrap_or_default()
    }

    pub fn blacklist(&self) -> &[String] {
        self.authorization.pubkey_blacklist.as_deref().unwrap_or_default()
    }
}

fn merge_missing(target: &mut Table, source: &Table) {
    for (key, value) in source {
        if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
        }
    }
}
