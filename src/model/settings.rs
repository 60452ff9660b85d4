//! Scalar and composite settings copied wholesale from origin to replica.

use serde::{Deserialize, Serialize};

use crate::model::null_as_default;

/// Body of `GET /{mode}/status` for the simple on/off features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EnableConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// Filter update settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FilteringConfig {
    pub enabled: bool,
    /// Update interval in hours.
    pub interval: u32,
}

/// Query log retention settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct QueryLogConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Retention in days.
    #[serde(default)]
    pub interval: f64,
    #[serde(default)]
    pub anonymize_client_ip: bool,
}

/// Statistics retention settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StatsConfig {
    /// Retention in days.
    #[serde(default)]
    pub interval: u32,
}

/// DNS server settings. Every field is optional: a field the origin does not
/// report is never sent to a replica, so the replica keeps its own value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DnsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "some_unless_null")]
    pub upstream_dns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_dns_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "some_unless_null")]
    pub bootstrap_dns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "some_unless_null")]
    pub fallback_dns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratelimit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking_ipv4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking_ipv6: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edns_cs_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dnssec_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_ipv6: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_max: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_optimistic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_clients: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_private_ptr_resolvers: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "some_unless_null")]
    pub local_ptr_upstreams: Option<Vec<String>>,
}

/// A reported-but-null list means "empty", not "absent".
fn some_unless_null<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    null_as_default(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_config_skips_absent_fields() {
        let cfg = DnsConfig {
            ratelimit: Some(20),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&cfg).unwrap(), r#"{"ratelimit":20}"#);
    }

    #[test]
    fn test_dns_config_null_list_is_present() {
        let cfg: DnsConfig = serde_json::from_str(r#"{"upstream_dns":null}"#).unwrap();
        assert_eq!(cfg.upstream_dns, Some(vec![]));
        assert_eq!(cfg.bootstrap_dns, None);
    }
}
