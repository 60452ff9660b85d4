//! Remote capability subsystem.
//!
//! # Data Flow
//! ```text
//! InstanceConfig
//!     → Connector::connect (validate URL, build transport)
//!     → Arc<dyn Appliance>
//!         → http.rs (reqwest against the management REST API)
//!         → fake.rs (in-memory state, call log, failure injection)
//! ```
//!
//! # Design Decisions
//! - `Appliance` is the only dependency the reconciliation engine has on the
//!   outside world
//! - One call per item for repeatable mutations; batching is the caller's job
//! - Every call returns `RemoteResult`: success, setup-required, transport or
//!   API failure

pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod http;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{InstanceConfig, ValidationError};
use crate::model::{
    AccessList, BlockedService, Client, DhcpConfig, DhcpStaticLease, DhcpStatus, DnsConfig,
    Filter, FilteringConfig, FilteringStatus, InitialSetup, QueryLogConfig, RewriteEntry,
    StatsConfig, Status,
};

pub use error::{RemoteError, RemoteResult};
#[cfg(any(test, feature = "test-util"))]
pub use fake::{CallGauge, FakeAppliance, FakeConnector};
pub use http::{HttpAppliance, HttpConnector};

/// A simple on/off protection feature with its own status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtectionFeature {
    SafeBrowsing,
    Parental,
    SafeSearch,
}

impl ProtectionFeature {
    pub const ALL: [ProtectionFeature; 3] = [
        ProtectionFeature::SafeBrowsing,
        ProtectionFeature::Parental,
        ProtectionFeature::SafeSearch,
    ];

    /// Path segment of the feature's endpoints.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtectionFeature::SafeBrowsing => "safebrowsing",
            ProtectionFeature::Parental => "parental",
            ProtectionFeature::SafeSearch => "safesearch",
        }
    }
}

/// Read and mutate the state of one appliance.
#[async_trait]
pub trait Appliance: Send + Sync {
    /// Host name used in logs and reports.
    fn host(&self) -> &str;

    async fn status(&self) -> RemoteResult<Status>;
    /// Provision a never-configured appliance.
    async fn setup(&self, setup: &InitialSetup) -> RemoteResult<()>;
    async fn set_protection(&self, enabled: bool) -> RemoteResult<()>;

    async fn rewrites(&self) -> RemoteResult<Vec<RewriteEntry>>;
    async fn add_rewrite(&self, entry: &RewriteEntry) -> RemoteResult<()>;
    async fn delete_rewrite(&self, entry: &RewriteEntry) -> RemoteResult<()>;

    async fn filtering(&self) -> RemoteResult<FilteringStatus>;
    async fn add_filter(&self, whitelist: bool, filter: &Filter) -> RemoteResult<()>;
    async fn remove_filter(&self, whitelist: bool, filter: &Filter) -> RemoteResult<()>;
    async fn update_filter(&self, whitelist: bool, filter: &Filter) -> RemoteResult<()>;
    async fn refresh_filters(&self, whitelist: bool) -> RemoteResult<()>;
    async fn set_user_rules(&self, rules: &[String]) -> RemoteResult<()>;
    async fn set_filtering_config(&self, config: &FilteringConfig) -> RemoteResult<()>;

    async fn protection_feature(&self, feature: ProtectionFeature) -> RemoteResult<bool>;
    async fn set_protection_feature(&self, feature: ProtectionFeature, enabled: bool) -> RemoteResult<()>;

    async fn blocked_services(&self) -> RemoteResult<Vec<BlockedService>>;
    async fn set_blocked_services(&self, services: &[BlockedService]) -> RemoteResult<()>;

    async fn clients(&self) -> RemoteResult<Vec<Client>>;
    async fn add_client(&self, client: &Client) -> RemoteResult<()>;
    async fn update_client(&self, client: &Client) -> RemoteResult<()>;
    async fn delete_client(&self, name: &str) -> RemoteResult<()>;

    async fn query_log_config(&self) -> RemoteResult<QueryLogConfig>;
    async fn set_query_log_config(&self, config: &QueryLogConfig) -> RemoteResult<()>;
    async fn stats_config(&self) -> RemoteResult<StatsConfig>;
    async fn set_stats_config(&self, config: &StatsConfig) -> RemoteResult<()>;

    async fn access_list(&self) -> RemoteResult<AccessList>;
    async fn set_access_list(&self, list: &AccessList) -> RemoteResult<()>;

    async fn dns_config(&self) -> RemoteResult<DnsConfig>;
    /// Partial update: only the fields present in `config` are changed.
    async fn set_dns_config(&self, config: &DnsConfig) -> RemoteResult<()>;

    async fn dhcp_status(&self) -> RemoteResult<DhcpStatus>;
    async fn set_dhcp_config(&self, config: &DhcpConfig) -> RemoteResult<()>;
    async fn add_static_lease(&self, lease: &DhcpStaticLease) -> RemoteResult<()>;
    async fn remove_static_lease(&self, lease: &DhcpStaticLease) -> RemoteResult<()>;
}

/// Builds an `Appliance` for an instance configuration.
pub trait Connector: Send + Sync {
    fn connect(&self, instance: &InstanceConfig) -> Result<Arc<dyn Appliance>, Vec<ValidationError>>;
}
