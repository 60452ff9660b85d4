//! Toggle synchronization.
//!
//! # Responsibilities
//! - Compare each scalar or composite setting between origin and replica
//! - Issue exactly one mutating call per differing setting, none otherwise
//! - Send only differing DNS fields (the DNS endpoint accepts partial
//!   documents); replace the DHCP server config as a whole

use std::future::Future;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{Features, InstanceConfig};
use crate::model::{DhcpConfig, DnsConfig, FilteringConfig};
use crate::observability::metrics;
use crate::remote::{Appliance, ProtectionFeature, RemoteResult};
use crate::snapshot::Snapshot;

/// A setting copied from origin to replica when it differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Toggle {
    Protection,
    SafeBrowsing,
    Parental,
    SafeSearch,
    FilteringConfig,
    UserRules,
    QueryLogConfig,
    StatsConfig,
    DnsConfig,
    DhcpConfig,
}

impl Toggle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Toggle::Protection => "protection",
            Toggle::SafeBrowsing => "safe_browsing",
            Toggle::Parental => "parental",
            Toggle::SafeSearch => "safe_search",
            Toggle::FilteringConfig => "filtering_config",
            Toggle::UserRules => "user_rules",
            Toggle::QueryLogConfig => "query_log_config",
            Toggle::StatsConfig => "stats_config",
            Toggle::DnsConfig => "dns_config",
            Toggle::DhcpConfig => "dhcp_config",
        }
    }

    fn from_feature(feature: ProtectionFeature) -> Self {
        match feature {
            ProtectionFeature::SafeBrowsing => Toggle::SafeBrowsing,
            ProtectionFeature::Parental => Toggle::Parental,
            ProtectionFeature::SafeSearch => Toggle::SafeSearch,
        }
    }
}

impl std::fmt::Display for Toggle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ToggleOutcome {
    Unchanged,
    Changed,
    /// Dry run: the setting differs but was left alone.
    WouldChange,
    Skipped { reason: String },
    Failed { error: String },
}

impl ToggleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToggleOutcome::Unchanged => "unchanged",
            ToggleOutcome::Changed => "changed",
            ToggleOutcome::WouldChange => "would_change",
            ToggleOutcome::Skipped { .. } => "skipped",
            ToggleOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ToggleOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToggleReport {
    pub toggle: Toggle,
    #[serde(flatten)]
    pub outcome: ToggleOutcome,
}

/// Copies settings onto one replica.
pub struct ToggleSynchronizer<'a> {
    appliance: &'a dyn Appliance,
    replica: &'a InstanceConfig,
    features: Features,
    dry_run: bool,
}

impl<'a> ToggleSynchronizer<'a> {
    pub fn new(
        appliance: &'a dyn Appliance,
        replica: &'a InstanceConfig,
        features: Features,
        dry_run: bool,
    ) -> Self {
        Self {
            appliance,
            replica,
            features,
            dry_run,
        }
    }

    /// Synchronize every selected toggle, appending to `reports` as each one
    /// completes.
    pub async fn sync_all(&self, origin: &Snapshot, current: &Snapshot, reports: &mut Vec<ToggleReport>) {
        let appliance = self.appliance;

        if self.features.general_settings {
            let enabled = origin.status.protection_enabled;
            reports.push(
                self.sync(
                    Toggle::Protection,
                    enabled != current.status.protection_enabled,
                    || appliance.set_protection(enabled),
                )
                .await,
            );

            for feature in ProtectionFeature::ALL {
                let enabled = origin.protection_feature(feature);
                reports.push(
                    self.sync(
                        Toggle::from_feature(feature),
                        enabled != current.protection_feature(feature),
                        || appliance.set_protection_feature(feature, enabled),
                    )
                    .await,
                );
            }
        }

        if self.features.filters {
            let desired = FilteringConfig {
                enabled: origin.filtering.enabled,
                interval: origin.filtering.interval,
            };
            let actual = FilteringConfig {
                enabled: current.filtering.enabled,
                interval: current.filtering.interval,
            };
            reports.push(
                self.sync(Toggle::FilteringConfig, desired != actual, || {
                    appliance.set_filtering_config(&desired)
                })
                .await,
            );

            let rules = &origin.filtering.user_rules;
            reports.push(
                self.sync(Toggle::UserRules, *rules != current.filtering.user_rules, || {
                    appliance.set_user_rules(rules)
                })
                .await,
            );
        }

        if self.features.query_log_config {
            let desired = &origin.query_log;
            reports.push(
                self.sync(Toggle::QueryLogConfig, *desired != current.query_log, || {
                    appliance.set_query_log_config(desired)
                })
                .await,
            );
        }

        if self.features.stats_config {
            let desired = &origin.stats;
            reports.push(
                self.sync(Toggle::StatsConfig, *desired != current.stats, || {
                    appliance.set_stats_config(desired)
                })
                .await,
            );
        }

        if self.features.dns_server_config {
            let report = match dns_patch(&origin.dns, &current.dns) {
                Ok(patch) => {
                    let differs = patch.is_some();
                    let patch = patch.unwrap_or_default();
                    self.sync(Toggle::DnsConfig, differs, || appliance.set_dns_config(&patch))
                        .await
                }
                Err(error) => self.finish(Toggle::DnsConfig, ToggleOutcome::Failed { error }),
            };
            reports.push(report);
        }

        if self.features.dhcp_server_config {
            let report = match self.desired_dhcp(origin) {
                Some(desired) => {
                    let differs = desired != current.dhcp.config();
                    self.sync(Toggle::DhcpConfig, differs, || appliance.set_dhcp_config(&desired))
                        .await
                }
                None => self.finish(
                    Toggle::DhcpConfig,
                    ToggleOutcome::Skipped {
                        reason: "origin DHCP server is not configured".to_string(),
                    },
                ),
            };
            reports.push(report);
        }
    }

    /// Origin's DHCP server config with the replica's local overrides.
    fn desired_dhcp(&self, origin: &Snapshot) -> Option<DhcpConfig> {
        let mut config = origin.dhcp.config();
        if !config.is_configured() {
            return None;
        }
        if let Some(name) = &self.replica.dhcp_interface_name {
            config.interface_name = name.clone();
        }
        if let Some(enabled) = self.replica.dhcp_server_enabled {
            config.enabled = enabled;
        }
        Some(config)
    }

    async fn sync<F, Fut>(&self, toggle: Toggle, differs: bool, set: F) -> ToggleReport
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RemoteResult<()>>,
    {
        let outcome = if !differs {
            ToggleOutcome::Unchanged
        } else if self.dry_run {
            ToggleOutcome::WouldChange
        } else {
            match set().await {
                Ok(()) => ToggleOutcome::Changed,
                Err(e) => ToggleOutcome::Failed { error: e.to_string() },
            }
        };
        self.finish(toggle, outcome)
    }

    fn finish(&self, toggle: Toggle, outcome: ToggleOutcome) -> ToggleReport {
        match &outcome {
            ToggleOutcome::Unchanged => tracing::debug!(toggle = %toggle, "Toggle unchanged"),
            ToggleOutcome::Failed { error } => {
                tracing::warn!(toggle = %toggle, error = %error, "Toggle sync failed")
            }
            other => tracing::info!(toggle = %toggle, outcome = other.as_str(), "Toggle synchronized"),
        }
        metrics::record_toggle(toggle, outcome.as_str());
        ToggleReport { toggle, outcome }
    }
}

/// Fields of `origin` that the replica lacks or holds with another value.
/// `None` when nothing differs.
pub fn dns_patch(origin: &DnsConfig, replica: &DnsConfig) -> Result<Option<DnsConfig>, String> {
    let origin = to_object(origin)?;
    let replica = to_object(replica)?;

    let patch: Map<String, Value> = origin
        .into_iter()
        .filter(|(field, value)| replica.get(field) != Some(value))
        .collect();

    if patch.is_empty() {
        return Ok(None);
    }
    serde_json::from_value(Value::Object(patch))
        .map(Some)
        .map_err(|e| e.to_string())
}

fn to_object(config: &DnsConfig) -> Result<Map<String, Value>, String> {
    match serde_json::to_value(config) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("unexpected DNS config shape: {}", other)),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DhcpStatus;
    use crate::remote::{FakeAppliance, RemoteError};

    fn general() -> Features {
        Features {
            general_settings: true,
            ..Features::none()
        }
    }

    fn protection(enabled: bool) -> Snapshot {
        let mut snapshot = Snapshot::default();
        snapshot.status.protection_enabled = enabled;
        snapshot
    }

    #[tokio::test]
    async fn test_protection_enable_once() {
        let fake = FakeAppliance::new("replica");
        let replica = InstanceConfig::new("http://r");
        let sync = ToggleSynchronizer::new(&fake, &replica, general(), false);
        let mut reports = Vec::new();

        sync.sync_all(&protection(true), &protection(false), &mut reports).await;

        assert_eq!(fake.mutations(), vec!["set_protection true"]);
        assert_eq!(reports[0].outcome, ToggleOutcome::Changed);
        assert!(reports[1..].iter().all(|r| r.outcome == ToggleOutcome::Unchanged));
    }

    #[tokio::test]
    async fn test_equal_values_issue_no_call() {
        let fake = FakeAppliance::new("replica");
        let replica = InstanceConfig::new("http://r");
        let sync = ToggleSynchronizer::new(&fake, &replica, Features::default(), false);
        let mut reports = Vec::new();

        sync.sync_all(&protection(true), &protection(true), &mut reports).await;

        assert!(fake.mutations().is_empty());
        assert!(reports.iter().all(|r| r.outcome != ToggleOutcome::Changed));
    }

    #[tokio::test]
    async fn test_dry_run_reports_would_change() {
        let fake = FakeAppliance::new("replica");
        let replica = InstanceConfig::new("http://r");
        let sync = ToggleSynchronizer::new(&fake, &replica, general(), true);
        let mut reports = Vec::new();

        sync.sync_all(&protection(true), &protection(false), &mut reports).await;

        assert!(fake.mutations().is_empty());
        assert_eq!(reports[0].outcome, ToggleOutcome::WouldChange);
    }

    #[tokio::test]
    async fn test_failure_is_reported_per_toggle() {
        let fake = FakeAppliance::new("replica");
        fake.fail_when("set_protection", RemoteError::Transport("reset".into()));
        let replica = InstanceConfig::new("http://r");
        let sync = ToggleSynchronizer::new(&fake, &replica, general(), false);
        let mut origin = protection(true);
        origin.parental = true;
        let mut reports = Vec::new();

        sync.sync_all(&origin, &protection(false), &mut reports).await;

        assert!(reports[0].outcome.is_failure());
        let parental = reports.iter().find(|r| r.toggle == Toggle::Parental).unwrap();
        assert_eq!(parental.outcome, ToggleOutcome::Changed);
        assert!(fake.state().parental);
    }

    #[test]
    fn test_dns_patch_only_differing_present_fields() {
        let origin = DnsConfig {
            upstream_dns: Some(vec!["1.1.1.1".into()]),
            ratelimit: Some(20),
            ..Default::default()
        };
        let replica = DnsConfig {
            upstream_dns: Some(vec!["9.9.9.9".into()]),
            ratelimit: Some(20),
            cache_size: Some(4096),
            ..Default::default()
        };

        let patch = dns_patch(&origin, &replica).unwrap().unwrap();
        assert_eq!(
            patch,
            DnsConfig {
                upstream_dns: Some(vec!["1.1.1.1".into()]),
                ..Default::default()
            }
        );

        assert_eq!(dns_patch(&origin, &origin).unwrap(), None);
    }

    #[tokio::test]
    async fn test_dns_patch_keeps_replica_only_fields() {
        let fake = FakeAppliance::new("replica");
        fake.update_state(|s| {
            s.dns = DnsConfig {
                ratelimit: Some(10),
                cache_size: Some(4096),
                ..Default::default()
            }
        });
        let replica = InstanceConfig::new("http://r");
        let features = Features {
            dns_server_config: true,
            ..Features::none()
        };
        let sync = ToggleSynchronizer::new(&fake, &replica, features, false);
        let mut origin = Snapshot::default();
        origin.dns.ratelimit = Some(20);
        let current = Snapshot {
            dns: fake.state().dns,
            ..Default::default()
        };
        let mut reports = Vec::new();

        sync.sync_all(&origin, &current, &mut reports).await;

        assert_eq!(fake.state().dns.ratelimit, Some(20));
        assert_eq!(fake.state().dns.cache_size, Some(4096));
    }

    #[tokio::test]
    async fn test_dhcp_config_with_replica_overrides() {
        let fake = FakeAppliance::new("replica");
        let replica = InstanceConfig {
            dhcp_interface_name: Some("eth1".into()),
            dhcp_server_enabled: Some(false),
            ..InstanceConfig::new("http://r")
        };
        let features = Features {
            dhcp_server_config: true,
            ..Features::none()
        };
        let sync = ToggleSynchronizer::new(&fake, &replica, features, false);
        let origin = Snapshot {
            dhcp: DhcpStatus {
                enabled: true,
                interface_name: "eth0".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut reports = Vec::new();

        sync.sync_all(&origin, &Snapshot::default(), &mut reports).await;

        let dhcp = fake.state().dhcp;
        assert_eq!(dhcp.interface_name, "eth1");
        assert!(!dhcp.enabled);

        let mut reports = Vec::new();
        let current = Snapshot {
            dhcp,
            ..Default::default()
        };
        sync.sync_all(&origin, &current, &mut reports).await;
        assert_eq!(reports[0].outcome, ToggleOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_unconfigured_origin_dhcp_is_skipped() {
        let fake = FakeAppliance::new("replica");
        let replica = InstanceConfig::new("http://r");
        let features = Features {
            dhcp_server_config: true,
            ..Features::none()
        };
        let sync = ToggleSynchronizer::new(&fake, &replica, features, false);
        let mut reports = Vec::new();

        sync.sync_all(&Snapshot::default(), &Snapshot::default(), &mut reports).await;

        assert!(matches!(reports[0].outcome, ToggleOutcome::Skipped { .. }));
        assert!(fake.mutations().is_empty());
    }
}
