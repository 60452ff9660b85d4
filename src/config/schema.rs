//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a sync run.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::model::EntityKind;
use crate::reconcile::ApplyOrder;

/// Root configuration for the sync engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SyncConfig {
    /// The authoritative appliance.
    pub origin: InstanceConfig,

    /// Appliances made to match the origin.
    pub replicas: Vec<InstanceConfig>,

    /// Default feature selection for every replica.
    pub features: Features,

    /// Run behaviour (concurrency, deadline, dry run).
    pub run: RunConfig,

    /// Per entity kind ordering of deletes and adds.
    pub apply_order: ApplyOrderConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl SyncConfig {
    /// Effective feature selection for a replica.
    pub fn features_for(&self, replica: &InstanceConfig) -> Features {
        replica.features.unwrap_or(self.features)
    }

    /// Union of all replica feature selections, used to decide what to read
    /// from the origin.
    pub fn origin_features(&self) -> Features {
        self.replicas
            .iter()
            .map(|r| self.features_for(r))
            .fold(Features::none(), |acc, f| acc.union(&f))
    }
}

/// Connection and policy settings for one appliance.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Base URL (e.g., "https://dns1.lan").
    pub url: String,

    /// API path below the base URL. Defaults to "control".
    pub api_path: Option<String>,

    pub username: Option<String>,

    pub password: Option<String>,

    /// Accept invalid TLS certificates.
    pub insecure_skip_verify: bool,

    /// Number of redirects to follow. None follows no redirects.
    pub redirect_limit: Option<usize>,

    /// Provision a fresh appliance when it reports setup-required.
    pub auto_setup: bool,

    /// Entity kinds whose replica-only entries are never deleted.
    pub protect_additional: Vec<EntityKind>,

    /// Replica-local DHCP interface name, replaces the origin's value.
    pub dhcp_interface_name: Option<String>,

    /// Replica-local DHCP server switch, replaces the origin's value.
    pub dhcp_server_enabled: Option<bool>,

    /// Overrides the top-level feature selection for this instance.
    pub features: Option<Features>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_path: None,
            username: None,
            password: None,
            insecure_skip_verify: false,
            redirect_limit: None,
            auto_setup: true,
            protect_additional: Vec::new(),
            dhcp_interface_name: None,
            dhcp_server_enabled: None,
            features: None,
        }
    }
}

impl InstanceConfig {
    /// Create an instance config pointing at `url` with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// True if replica-only entries of `kind` must be kept.
    pub fn protects(&self, kind: EntityKind) -> bool {
        self.protect_additional.contains(&kind)
    }

    /// Credentials pair, present only when both halves are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }
}

/// Selects which entity kinds and toggles take part in a run.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Features {
    /// Protection, safe browsing, parental control and safe search.
    pub general_settings: bool,
    pub query_log_config: bool,
    pub stats_config: bool,
    pub client_settings: bool,
    pub services: bool,
    /// Filter lists, user rules and filtering config.
    pub filters: bool,
    pub dhcp_server_config: bool,
    pub dhcp_static_leases: bool,
    pub dns_access_lists: bool,
    pub dns_server_config: bool,
    pub dns_rewrites: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            general_settings: true,
            query_log_config: true,
            stats_config: true,
            client_settings: true,
            services: true,
            filters: true,
            dhcp_server_config: true,
            dhcp_static_leases: true,
            dns_access_lists: true,
            dns_server_config: true,
            dns_rewrites: true,
        }
    }
}

impl Features {
    /// Every feature switched off.
    pub fn none() -> Self {
        Self {
            general_settings: false,
            query_log_config: false,
            stats_config: false,
            client_settings: false,
            services: false,
            filters: false,
            dhcp_server_config: false,
            dhcp_static_leases: false,
            dns_access_lists: false,
            dns_server_config: false,
            dns_rewrites: false,
        }
    }

    pub fn union(&self, other: &Features) -> Features {
        Features {
            general_settings: self.general_settings || other.general_settings,
            query_log_config: self.query_log_config || other.query_log_config,
            stats_config: self.stats_config || other.stats_config,
            client_settings: self.client_settings || other.client_settings,
            services: self.services || other.services,
            filters: self.filters || other.filters,
            dhcp_server_config: self.dhcp_server_config || other.dhcp_server_config,
            dhcp_static_leases: self.dhcp_static_leases || other.dhcp_static_leases,
            dns_access_lists: self.dns_access_lists || other.dns_access_lists,
            dns_server_config: self.dns_server_config || other.dns_server_config,
            dns_rewrites: self.dns_rewrites || other.dns_rewrites,
        }
    }

    /// Whether the given entity kind is selected.
    pub fn includes(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::DnsRewrites => self.dns_rewrites,
            EntityKind::BlocklistFilters | EntityKind::AllowlistFilters => self.filters,
            EntityKind::Clients => self.client_settings,
            EntityKind::BlockedServices => self.services,
            EntityKind::DhcpStaticLeases => self.dhcp_static_leases,
            EntityKind::AccessList => self.dns_access_lists,
        }
    }

    /// DHCP status is read when either DHCP feature is selected.
    pub fn needs_dhcp(&self) -> bool {
        self.dhcp_server_config || self.dhcp_static_leases
    }
}

/// Run behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum number of replicas processed at the same time.
    pub concurrency: usize,

    /// Run-wide deadline in seconds; bounds every outbound call.
    pub deadline_secs: u64,

    /// Timeout for a single HTTP call in seconds.
    pub request_timeout_secs: u64,

    /// Compute and report operations without applying them.
    pub dry_run: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            deadline_secs: 300,
            request_timeout_secs: 30,
            dry_run: false,
        }
    }
}

/// Ordering of deletes relative to adds, per entity kind.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApplyOrderConfig {
    pub dns_rewrites: ApplyOrder,
    pub filters: ApplyOrder,
    pub clients: ApplyOrder,
    pub dhcp_static_leases: ApplyOrder,
}

impl Default for ApplyOrderConfig {
    fn default() -> Self {
        Self {
            dns_rewrites: ApplyOrder::DeleteFirst,
            filters: ApplyOrder::DeleteFirst,
            clients: ApplyOrder::AddFirst,
            dhcp_static_leases: ApplyOrder::DeleteFirst,
        }
    }
}

impl ApplyOrderConfig {
    /// Ordering policy for a keyed entity kind.
    pub fn for_kind(&self, kind: EntityKind) -> ApplyOrder {
        match kind {
            EntityKind::DnsRewrites => self.dns_rewrites,
            EntityKind::BlocklistFilters | EntityKind::AllowlistFilters => self.filters,
            EntityKind::Clients => self.clients,
            EntityKind::DhcpStaticLeases => self.dhcp_static_leases,
            // Whole-list kinds are applied with a single call.
            EntityKind::BlockedServices | EntityKind::AccessList => ApplyOrder::DeleteFirst,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Prometheus exporter bind address. None disables the exporter.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_address: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml() {
        let config: SyncConfig = toml::from_str(
            r#"
            [origin]
            url = "http://origin:3000"

            [[replicas]]
            url = "http://replica:3000"
            protect_additional = ["dns_rewrites", "clients"]
            "#,
        )
        .unwrap();

        assert_eq!(config.replicas.len(), 1);
        assert!(config.replicas[0].auto_setup);
        assert!(config.replicas[0].protects(EntityKind::Clients));
        assert!(!config.replicas[0].protects(EntityKind::BlocklistFilters));
        assert_eq!(config.run.concurrency, 4);
        assert_eq!(config.apply_order.clients, ApplyOrder::AddFirst);
        assert_eq!(config.apply_order.filters, ApplyOrder::DeleteFirst);
    }

    #[test]
    fn test_replica_feature_override() {
        let mut config = SyncConfig::default();
        let mut replica = InstanceConfig::new("http://a");
        replica.features = Some(Features {
            dns_rewrites: false,
            ..Features::none()
        });
        config.replicas.push(replica.clone());
        config.replicas.push(InstanceConfig::new("http://b"));

        assert!(!config.features_for(&replica).dns_rewrites);
        assert!(config.origin_features().dns_rewrites);
    }

    #[test]
    fn test_credentials_require_both_halves() {
        let mut instance = InstanceConfig::new("http://a");
        instance.username = Some("admin".into());
        assert!(instance.credentials().is_none());
        instance.password = Some("secret".into());
        assert_eq!(instance.credentials(), Some(("admin", "secret")));
    }
}
