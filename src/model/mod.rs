//! Domain types exchanged with appliances.
//!
//! # Responsibilities
//! - Mirror the appliance's JSON shapes for every entity kind and toggle
//! - Define the stable identity key of each keyed entity
//! - Define which attributes converge and which stay replica-local
//!
//! # Design Decisions
//! - Collections that the API may return as `null` deserialize as empty
//! - Composite settings use `Option` fields so absent values are never sent

pub mod access;
pub mod client;
pub mod dhcp;
pub mod filter;
pub mod rewrite;
pub mod service;
pub mod settings;
pub mod status;

use serde::{Deserialize, Deserializer, Serialize};

pub use access::AccessList;
pub use client::Client;
pub use dhcp::{DhcpConfig, DhcpStaticLease, DhcpStatus, DhcpV4Config, DhcpV6Config};
pub use filter::{Filter, FilteringStatus};
pub use rewrite::RewriteEntry;
pub use service::BlockedService;
pub use settings::{DnsConfig, FilteringConfig, QueryLogConfig, StatsConfig};
pub use status::{AddressInfo, InitialSetup, Status};

/// The collections reconciled item by item or list by list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    DnsRewrites,
    BlocklistFilters,
    AllowlistFilters,
    Clients,
    BlockedServices,
    DhcpStaticLeases,
    AccessList,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::DnsRewrites,
        EntityKind::BlocklistFilters,
        EntityKind::AllowlistFilters,
        EntityKind::Clients,
        EntityKind::BlockedServices,
        EntityKind::DhcpStaticLeases,
        EntityKind::AccessList,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::DnsRewrites => "dns_rewrites",
            EntityKind::BlocklistFilters => "blocklist_filters",
            EntityKind::AllowlistFilters => "allowlist_filters",
            EntityKind::Clients => "clients",
            EntityKind::BlockedServices => "blocked_services",
            EntityKind::DhcpStaticLeases => "dhcp_static_leases",
            EntityKind::AccessList => "access_list",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Treat an explicit JSON `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Sorted copy, for order-insensitive comparison of string lists.
pub(crate) fn sorted(items: &[String]) -> Vec<&str> {
    let mut out: Vec<&str> = items.iter().map(String::as_str).collect();
    out.sort_unstable();
    out
}
