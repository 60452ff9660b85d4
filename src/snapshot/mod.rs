//! Snapshot subsystem.
//!
//! # Data Flow
//! ```text
//! Arc<dyn Appliance> + Features
//!     → fetch_snapshot
//!         → read every selected collection and setting
//!         → on SetupRequired: one provisioning call, one retry
//!     → Snapshot (per run, per instance, never persisted)
//! ```
//!
//! # Design Decisions
//! - A snapshot is all-or-nothing: any failed read fails the instance
//! - Sub-collections come from independent calls and may be mutually
//!   inconsistent; the next run converges whatever this one missed
//! - Collections of unselected features are left empty and never compared

pub mod error;

use crate::config::{Features, InstanceConfig};
use crate::model::{
    AccessList, BlockedService, Client, DhcpStatus, DnsConfig, FilteringStatus, InitialSetup,
    QueryLogConfig, RewriteEntry, StatsConfig, Status,
};
use crate::remote::{Appliance, ProtectionFeature, RemoteError, RemoteResult};

pub use error::SyncError;

/// Full configuration of one appliance at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub status: Status,
    pub rewrites: Vec<RewriteEntry>,
    pub filtering: FilteringStatus,
    pub safebrowsing: bool,
    pub parental: bool,
    pub safesearch: bool,
    pub blocked_services: Vec<BlockedService>,
    pub clients: Vec<Client>,
    pub query_log: QueryLogConfig,
    pub stats: StatsConfig,
    pub access_list: AccessList,
    pub dns: DnsConfig,
    pub dhcp: DhcpStatus,
}

impl Snapshot {
    pub fn protection_feature(&self, feature: ProtectionFeature) -> bool {
        match feature {
            ProtectionFeature::SafeBrowsing => self.safebrowsing,
            ProtectionFeature::Parental => self.parental,
            ProtectionFeature::SafeSearch => self.safesearch,
        }
    }
}

/// Fetch a snapshot of `appliance`.
///
/// With `provision`, a setup-required signal triggers exactly one initial
/// setup with the instance's credentials followed by one retry. Without it,
/// setup-required is fatal straight away.
pub async fn fetch_snapshot(
    appliance: &dyn Appliance,
    instance: &InstanceConfig,
    features: &Features,
    provision: bool,
) -> Result<Snapshot, SyncError> {
    match read(appliance, features).await {
        Ok(snapshot) => Ok(snapshot),
        Err(RemoteError::SetupRequired) if provision => {
            let (username, password) = instance.credentials().unwrap_or(("", ""));
            tracing::info!(host = %appliance.host(), "Appliance requires setup, provisioning");
            appliance
                .setup(&InitialSetup::with_credentials(username, password))
                .await
                .map_err(SyncError::SetupFailed)?;

            match read(appliance, features).await {
                Ok(snapshot) => Ok(snapshot),
                Err(RemoteError::SetupRequired) => Err(SyncError::SetupStillRequired),
                Err(e) => Err(SyncError::Fetch(e)),
            }
        }
        Err(e) => Err(SyncError::Fetch(e)),
    }
}

async fn read(appliance: &dyn Appliance, features: &Features) -> RemoteResult<Snapshot> {
    let mut snapshot = Snapshot {
        status: appliance.status().await?,
        ..Default::default()
    };

    if features.dns_rewrites {
        snapshot.rewrites = appliance.rewrites().await?;
    }
    if features.filters {
        snapshot.filtering = appliance.filtering().await?;
    }
    if features.general_settings {
        snapshot.safebrowsing = appliance.protection_feature(ProtectionFeature::SafeBrowsing).await?;
        snapshot.parental = appliance.protection_feature(ProtectionFeature::Parental).await?;
        snapshot.safesearch = appliance.protection_feature(ProtectionFeature::SafeSearch).await?;
    }
    if features.services {
        snapshot.blocked_services = appliance.blocked_services().await?;
    }
    if features.client_settings {
        snapshot.clients = appliance.clients().await?;
    }
    if features.query_log_config {
        snapshot.query_log = appliance.query_log_config().await?;
    }
    if features.stats_config {
        snapshot.stats = appliance.stats_config().await?;
    }
    if features.dns_access_lists {
        snapshot.access_list = appliance.access_list().await?;
    }
    if features.dns_server_config {
        snapshot.dns = appliance.dns_config().await?;
    }
    if features.needs_dhcp() {
        snapshot.dhcp = appliance.dhcp_status().await?;
    }

    Ok(snapshot)
}
