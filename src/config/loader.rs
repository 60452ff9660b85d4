//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::SyncConfig;
use crate::config::validation::{join_errors, validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<SyncConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<SyncConfig, ConfigError> {
    let config: SyncConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
            [origin]
            url = "https://origin.lan"
            username = "admin"
            password = "secret"

            [[replicas]]
            url = "https://replica.lan"
            username = "admin"
            password = "secret"
            dhcp_interface_name = "eth1"

            [replicas.features]
            dhcp_server_config = false

            [run]
            concurrency = 2
            dry_run = true

            [apply_order]
            clients = "delete_first"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        let replica = &config.replicas[0];
        assert_eq!(replica.dhcp_interface_name.as_deref(), Some("eth1"));
        assert!(!config.features_for(replica).dhcp_server_config);
        assert!(config.features_for(replica).dns_rewrites);
        assert!(config.run.dry_run);
        assert_eq!(config.run.concurrency, 2);
        assert_eq!(
            config.apply_order.clients,
            crate::reconcile::ApplyOrder::DeleteFirst
        );
    }

    #[test]
    fn test_validation_error_message() {
        let err = parse_config("[origin]\nurl = \"http://o\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("no replicas configured"));
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[origin\nurl=").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
