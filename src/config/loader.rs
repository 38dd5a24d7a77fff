//! Configuration loading from disk.

use std::path::Path;
use std::fs;
use crate::config::schema::ManagerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate the manager configuration from a TOML file.
///
/// A missing file yields the defaults, so a bare `relay-manager` run works
/// next to a relay binary on the `PATH`.
pub fn load_config(path: &Path) -> Result<ManagerConfig, ConfigError> {
    let config: ManagerConfig = match fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Manager config not found, using defaults");
            ManagerConfig::default()
        }
        Err(e) => return Err(ConfigError::Io(e)),
    };

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manager.toml");
        fs::write(
            &path,
            "[relay]\nbinary = \"/usr/local/bin/relay\"\nauto_start = false\n\n[restart]\nmax_attempts = 2\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.relay.binary, "/usr/local/bin/relay");
        assert!(!config.relay.auto_start);
        assert_eq!(config.relay.config_flag, "--config");
        assert_eq!(config.restart.max_attempts, 2);
        assert_eq!(config.supervisor.reload_signal, "SIGHUP");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manager.toml");
        fs::write(&path, "[supervisor]\ngrace_period_ms = 0\n").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.relay.config_path, "config.toml");
    }
}
