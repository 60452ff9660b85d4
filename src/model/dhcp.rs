//! DHCP server configuration and static leases.

use serde::{Deserialize, Serialize};

use crate::model::null_as_default;
use crate::reconcile::Keyed;

/// A static lease, identified by its MAC address (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DhcpStaticLease {
    pub mac: String,
    pub ip: String,
    #[serde(default)]
    pub hostname: String,
}

impl DhcpStaticLease {
    pub fn new(mac: impl Into<String>, ip: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            mac: mac.into(),
            ip: ip.into(),
            hostname: hostname.into(),
        }
    }
}

impl Keyed for DhcpStaticLease {
    type Key = String;

    fn key(&self) -> String {
        self.mac.to_ascii_lowercase()
    }

    fn same_as(&self, other: &Self) -> bool {
        self.ip == other.ip && self.hostname == other.hostname
    }

    fn label(&self) -> String {
        format!("{} ({})", self.mac, self.ip)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DhcpV4Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_mask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_duration: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DhcpV6Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_duration: Option<u64>,
}

/// Response of `GET /dhcp/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DhcpStatus {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub interface_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v4: Option<DhcpV4Config>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v6: Option<DhcpV6Config>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub static_leases: Vec<DhcpStaticLease>,
}

impl DhcpStatus {
    /// The server configuration part of the status document.
    pub fn config(&self) -> DhcpConfig {
        DhcpConfig {
            enabled: self.enabled,
            interface_name: self.interface_name.clone(),
            v4: self.v4.clone(),
            v6: self.v6.clone(),
        }
    }
}

/// Body of `POST /dhcp/set_config`. Replaced as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DhcpConfig {
    pub enabled: bool,
    pub interface_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v4: Option<DhcpV4Config>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v6: Option<DhcpV6Config>,
}

impl DhcpConfig {
    /// A server without an interface has never been set up.
    pub fn is_configured(&self) -> bool {
        !self.interface_name.is_empty()
    }
}
