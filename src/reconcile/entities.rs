//! Per entity kind reconciliation of one replica.

use std::collections::BTreeMap;

use crate::config::{ApplyOrderConfig, Features, InstanceConfig};
use crate::model::{EntityKind, Filter};
use crate::reconcile::apply::{apply, ApplyResult, ItemSink, Operation};
use crate::reconcile::diff::{diff, Keyed};
use crate::reconcile::report::EntityReport;
use crate::reconcile::sinks::{ClientSink, FilterSink, LeaseSink, RewriteSink};
use crate::reconcile::wholesale::{reconcile_access_list, reconcile_blocked_services};
use crate::remote::Appliance;
use crate::snapshot::Snapshot;

/// Diffs and applies every selected entity kind on one replica. Results are
/// written into the caller's map as each kind completes, so a cancelled run
/// still reports the kinds that finished.
pub struct EntityReconciler<'a> {
    appliance: &'a dyn Appliance,
    replica: &'a InstanceConfig,
    features: Features,
    order: &'a ApplyOrderConfig,
    dry_run: bool,
}

impl<'a> EntityReconciler<'a> {
    pub fn new(
        appliance: &'a dyn Appliance,
        replica: &'a InstanceConfig,
        features: Features,
        order: &'a ApplyOrderConfig,
        dry_run: bool,
    ) -> Self {
        Self {
            appliance,
            replica,
            features,
            order,
            dry_run,
        }
    }

    /// Reconcile one entity kind if selected.
    pub async fn reconcile(
        &self,
        kind: EntityKind,
        origin: &Snapshot,
        current: &Snapshot,
        reports: &mut BTreeMap<EntityKind, EntityReport>,
    ) {
        if !self.features.includes(kind) {
            return;
        }
        let appliance = self.appliance;
        let protect = self.replica.protects(kind);

        let report = match kind {
            EntityKind::DnsRewrites => {
                self.keyed(kind, &RewriteSink { appliance }, &origin.rewrites, &current.rewrites)
                    .await
                    .0
            }
            EntityKind::BlocklistFilters | EntityKind::AllowlistFilters => {
                let whitelist = kind == EntityKind::AllowlistFilters;
                self.filters(
                    kind,
                    whitelist,
                    origin.filtering.list(whitelist),
                    current.filtering.list(whitelist),
                )
                .await
            }
            EntityKind::Clients => {
                self.keyed(kind, &ClientSink { appliance }, &origin.clients, &current.clients)
                    .await
                    .0
            }
            EntityKind::BlockedServices => {
                reconcile_blocked_services(
                    appliance,
                    &origin.blocked_services,
                    &current.blocked_services,
                    protect,
                    self.dry_run,
                )
                .await
            }
            EntityKind::DhcpStaticLeases => {
                self.keyed(
                    kind,
                    &LeaseSink { appliance },
                    &origin.dhcp.static_leases,
                    &current.dhcp.static_leases,
                )
                .await
                .0
            }
            EntityKind::AccessList => {
                reconcile_access_list(appliance, &origin.access_list, &current.access_list, self.dry_run)
                    .await
            }
        };

        tracing::info!(
            kind = %kind,
            added = report.added,
            updated = report.updated,
            deleted = report.deleted,
            unchanged = report.unchanged,
            failed = report.failed,
            dry_run = self.dry_run,
            "Entity kind reconciled"
        );
        reports.insert(kind, report);
    }

    async fn keyed<T, S>(
        &self,
        kind: EntityKind,
        sink: &S,
        origin: &[T],
        current: &[T],
    ) -> (EntityReport, ApplyResult)
    where
        T: Keyed + Clone + Sync,
        S: ItemSink<T>,
    {
        let plan = diff(origin, current, self.replica.protects(kind));
        if self.dry_run {
            return (EntityReport::planned(&plan), ApplyResult::default());
        }
        let result = apply(sink, kind, &plan, self.order.for_kind(kind)).await;
        (EntityReport::applied(&plan, &result), result)
    }

    /// Filter lists of one polarity, refreshed once when anything was added
    /// or updated.
    async fn filters(
        &self,
        kind: EntityKind,
        whitelist: bool,
        origin: &[Filter],
        current: &[Filter],
    ) -> EntityReport {
        let sink = FilterSink {
            appliance: self.appliance,
            whitelist,
        };
        let (mut report, result) = self.keyed(kind, &sink, origin, current).await;

        if result.succeeded(Operation::Add) + result.succeeded(Operation::Update) > 0 {
            let mut refresh = ApplyResult::default();
            let outcome = self.appliance.refresh_filters(whitelist).await;
            refresh.record(kind, Operation::Refresh, kind.as_str().to_string(), outcome);
            report.absorb_failures(&refresh);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Client, DhcpStaticLease, RewriteEntry};
    use crate::remote::{FakeAppliance, RemoteError};

    fn snapshot_with(f: impl FnOnce(&mut Snapshot)) -> Snapshot {
        let mut snapshot = Snapshot::default();
        f(&mut snapshot);
        snapshot
    }

    async fn run(
        fake: &FakeAppliance,
        replica: &InstanceConfig,
        dry_run: bool,
        kind: EntityKind,
        origin: &Snapshot,
        current: &Snapshot,
    ) -> EntityReport {
        let order = ApplyOrderConfig::default();
        let reconciler = EntityReconciler::new(fake, replica, Features::default(), &order, dry_run);
        let mut reports = BTreeMap::new();
        reconciler.reconcile(kind, origin, current, &mut reports).await;
        reports.remove(&kind).unwrap()
    }

    #[tokio::test]
    async fn test_rewrites_converge() {
        let fake = FakeAppliance::new("replica");
        let stale = RewriteEntry::new("old.lan", "10.0.0.9");
        fake.update_state(|s| s.rewrites.push(stale.clone()));
        let origin = snapshot_with(|s| s.rewrites = vec![RewriteEntry::new("nas.lan", "10.0.0.5")]);
        let current = snapshot_with(|s| s.rewrites = vec![stale]);
        let replica = InstanceConfig::new("http://r");

        let report = run(&fake, &replica, false, EntityKind::DnsRewrites, &origin, &current).await;

        assert_eq!((report.added, report.deleted), (1, 1));
        assert_eq!(fake.state().rewrites, origin.rewrites);
        assert_eq!(
            fake.mutations(),
            vec!["delete_rewrite old.lan -> 10.0.0.9", "add_rewrite nas.lan -> 10.0.0.5"]
        );
    }

    #[tokio::test]
    async fn test_protected_kind_keeps_replica_only() {
        let fake = FakeAppliance::new("replica");
        let local = Client::new("laptop", &["10.0.0.50"]);
        fake.update_state(|s| s.clients.push(local.clone()));
        let origin = snapshot_with(|s| s.clients = vec![Client::new("tv", &["10.0.0.20"])]);
        let current = snapshot_with(|s| s.clients = vec![local]);
        let replica = InstanceConfig {
            protect_additional: vec![EntityKind::Clients],
            ..InstanceConfig::new("http://r")
        };

        let report = run(&fake, &replica, false, EntityKind::Clients, &origin, &current).await;

        assert_eq!((report.added, report.deleted), (1, 0));
        assert_eq!(fake.state().clients.len(), 2);
    }

    #[tokio::test]
    async fn test_filter_refresh_once_per_polarity() {
        let fake = FakeAppliance::new("replica");
        let origin = snapshot_with(|s| {
            s.filtering.whitelist_filters = vec![
                Filter::new("a", "https://l/a", true),
                Filter::new("b", "https://l/b", true),
            ]
        });
        let replica = InstanceConfig::new("http://r");

        run(&fake, &replica, false, EntityKind::AllowlistFilters, &origin, &Snapshot::default()).await;

        let refreshes: Vec<String> = fake
            .mutations()
            .into_iter()
            .filter(|c| c.starts_with("refresh"))
            .collect();
        assert_eq!(refreshes, vec!["refresh_filters[true]"]);
        assert!(fake.state().filtering.filters.is_empty());
    }

    #[tokio::test]
    async fn test_no_refresh_when_only_deleting() {
        let fake = FakeAppliance::new("replica");
        let stale = Filter::new("old", "https://l/old", true);
        fake.update_state(|s| s.filtering.filters.push(stale.clone()));
        let current = snapshot_with(|s| s.filtering.filters = vec![stale]);
        let replica = InstanceConfig::new("http://r");

        run(&fake, &replica, false, EntityKind::BlocklistFilters, &Snapshot::default(), &current).await;

        assert_eq!(fake.mutations(), vec!["remove_filter[false] https://l/old"]);
    }

    #[tokio::test]
    async fn test_refresh_failure_is_reported() {
        let fake = FakeAppliance::new("replica");
        fake.fail_when("refresh_filters", RemoteError::Transport("timeout".into()));
        let origin = snapshot_with(|s| s.filtering.filters = vec![Filter::new("a", "https://l/a", true)]);
        let replica = InstanceConfig::new("http://r");

        let report =
            run(&fake, &replica, false, EntityKind::BlocklistFilters, &origin, &Snapshot::default()).await;

        assert_eq!(report.added, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors[0].op, Operation::Refresh);
    }

    #[tokio::test]
    async fn test_dry_run_plans_without_mutating() {
        let fake = FakeAppliance::new("replica");
        let origin = snapshot_with(|s| {
            s.dhcp.static_leases = vec![DhcpStaticLease::new("aa:bb:cc:dd:ee:01", "10.0.0.5", "nas")]
        });
        let replica = InstanceConfig::new("http://r");

        let report =
            run(&fake, &replica, true, EntityKind::DhcpStaticLeases, &origin, &Snapshot::default()).await;

        assert_eq!(report.added, 1);
        assert!(fake.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_unselected_kind_is_not_reported() {
        let fake = FakeAppliance::new("replica");
        let replica = InstanceConfig::new("http://r");
        let order = ApplyOrderConfig::default();
        let features = Features {
            dns_rewrites: false,
            ..Features::default()
        };
        let reconciler = EntityReconciler::new(&fake, &replica, features, &order, false);
        let mut reports = BTreeMap::new();

        reconciler
            .reconcile(EntityKind::DnsRewrites, &Snapshot::default(), &Snapshot::default(), &mut reports)
            .await;

        assert!(reports.is_empty());
    }
}
