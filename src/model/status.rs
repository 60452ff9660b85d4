//! Appliance status and first-run provisioning.

use serde::{Deserialize, Serialize};

/// Response of `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Status {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub protection_enabled: bool,
    #[serde(default)]
    pub running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub ip: String,
    pub port: u16,
}

/// Body of `POST /install/configure` for a never-provisioned appliance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialSetup {
    pub web: AddressInfo,
    pub dns: AddressInfo,
    pub username: String,
    pub password: String,
}

impl InitialSetup {
    /// Listen on all interfaces with the default web and DNS ports, using the
    /// credentials the sync engine will authenticate with afterwards.
    pub fn with_credentials(username: &str, password: &str) -> Self {
        Self {
            web: AddressInfo {
                ip: "0.0.0.0".to_string(),
                port: 3000,
            },
            dns: AddressInfo {
                ip: "0.0.0.0".to_string(),
                port: 53,
            },
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}
