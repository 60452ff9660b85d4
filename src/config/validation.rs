//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate instance URLs and credential pairs
//! - Validate value ranges (concurrency > 0, deadline > 0)
//! - Detect duplicate replicas
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SyncConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::{InstanceConfig, SyncConfig};

/// A semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{instance}: invalid URL '{url}': {reason}")]
    InvalidUrl {
        instance: String,
        url: String,
        reason: String,
    },

    #[error("{instance}: username and password must be set together")]
    IncompleteCredentials { instance: String },

    #[error("no replicas configured")]
    NoReplicas,

    #[error("replica '{0}' is configured more than once")]
    DuplicateReplica(String),

    #[error("replica '{0}' points at the origin")]
    ReplicaIsOrigin(String),

    #[error("{instance}: cannot build HTTP client: {reason}")]
    ClientBuild { instance: String, reason: String },

    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },
}

/// Comma-separated messages, for error displays.
pub(crate) fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate a whole configuration, collecting every problem.
pub fn validate_config(config: &SyncConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = validate_instance("origin", &config.origin) {
        errors.extend(e);
    }

    if config.replicas.is_empty() {
        errors.push(ValidationError::NoReplicas);
    }

    let origin_url = normalized(&config.origin.url);
    let mut seen = HashSet::new();
    for (i, replica) in config.replicas.iter().enumerate() {
        if let Err(e) = validate_instance(&format!("replica[{}]", i), replica) {
            errors.extend(e);
        }
        let url = normalized(&replica.url);
        if url == origin_url {
            errors.push(ValidationError::ReplicaIsOrigin(replica.url.clone()));
        }
        if !seen.insert(url) {
            errors.push(ValidationError::DuplicateReplica(replica.url.clone()));
        }
    }

    if config.run.concurrency == 0 {
        errors.push(ValidationError::ZeroValue { field: "run.concurrency" });
    }
    if config.run.deadline_secs == 0 {
        errors.push(ValidationError::ZeroValue { field: "run.deadline_secs" });
    }
    if config.run.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue { field: "run.request_timeout_secs" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a single instance. Used at load time and again by the connector
/// before any call is attempted.
pub fn validate_instance(label: &str, instance: &InstanceConfig) -> Result<Url, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let parsed = match Url::parse(&instance.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => Some(url),
        Ok(url) => {
            errors.push(ValidationError::InvalidUrl {
                instance: label.to_string(),
                url: instance.url.clone(),
                reason: format!("unsupported scheme '{}' or missing host", url.scheme()),
            });
            None
        }
        Err(e) => {
            errors.push(ValidationError::InvalidUrl {
                instance: label.to_string(),
                url: instance.url.clone(),
                reason: e.to_string(),
            });
            None
        }
    };

    let has_user = instance.username.as_deref().is_some_and(|u| !u.is_empty());
    let has_pass = instance.password.as_deref().is_some_and(|p| !p.is_empty());
    if has_user != has_pass {
        errors.push(ValidationError::IncompleteCredentials {
            instance: label.to_string(),
        });
    }

    match parsed {
        Some(url) if errors.is_empty() => Ok(url),
        _ => Err(errors),
    }
}

fn normalized(url: &str) -> String {
    url.trim_end_matches('/').to_ascii_lowercase()
}
