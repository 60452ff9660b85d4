//! Per replica worker.
//!
//! # Responsibilities
//! - Connect, fetch the replica snapshot (provisioning if allowed, never in a dry run)
//! - Reconcile entity kinds and toggles strictly in sequence
//! - Stop at the run deadline, keeping whatever was already reported

use std::sync::Arc;

use tokio::time::Instant;
use tracing::Instrument;

use crate::config::{InstanceConfig, SyncConfig};
use crate::model::EntityKind;
use crate::observability::metrics;
use crate::orchestrator::report::ReplicaReport;
use crate::reconcile::{EntityReconciler, ToggleSynchronizer};
use crate::remote::Connector;
use crate::snapshot::{fetch_snapshot, Snapshot, SyncError};

/// Entity kinds reconciled before the toggles. Static leases come after the
/// DHCP server config so a freshly configured server can accept them.
const BEFORE_TOGGLES: [EntityKind; 6] = [
    EntityKind::DnsRewrites,
    EntityKind::BlocklistFilters,
    EntityKind::AllowlistFilters,
    EntityKind::Clients,
    EntityKind::BlockedServices,
    EntityKind::AccessList,
];
const AFTER_TOGGLES: [EntityKind; 1] = [EntityKind::DhcpStaticLeases];

pub struct ReplicaWorker {
    pub config: Arc<SyncConfig>,
    pub connector: Arc<dyn Connector>,
    pub replica: InstanceConfig,
    pub origin: Arc<Snapshot>,
}

impl ReplicaWorker {
    /// Process the replica until done or until `deadline`.
    pub async fn run(self, deadline: Instant) -> ReplicaReport {
        let mut report = ReplicaReport::new(self.replica.url.clone());
        let span = tracing::info_span!("replica", host = %self.replica.url);

        let outcome = tokio::time::timeout_at(deadline, self.process(&mut report))
            .instrument(span.clone())
            .await;

        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(_) => Some(SyncError::DeadlineExceeded),
        };
        report.finish(error);

        span.in_scope(|| match &report.fatal_error {
            Some(error) => tracing::warn!(status = report.status.as_str(), error = %error, "Replica finished"),
            None => tracing::info!(
                status = report.status.as_str(),
                changes = report.change_count(),
                failures = report.failure_count(),
                "Replica finished"
            ),
        });
        metrics::record_replica(report.status.as_str());
        report
    }

    async fn process(&self, report: &mut ReplicaReport) -> Result<(), SyncError> {
        let appliance = self
            .connector
            .connect(&self.replica)
            .map_err(SyncError::Validation)?;
        let features = self.config.features_for(&self.replica);
        let dry_run = self.config.run.dry_run;

        // Setup is a mutation, so a dry run never provisions.
        let provision = self.replica.auto_setup && !dry_run;
        let current = fetch_snapshot(appliance.as_ref(), &self.replica, &features, provision).await?;

        let (origin_version, replica_version) = (&self.origin.status.version, &current.status.version);
        if !origin_version.is_empty() && origin_version != replica_version {
            tracing::warn!(
                origin_version = %origin_version,
                replica_version = %replica_version,
                "Origin and replica run different versions"
            );
        }

        let entities = EntityReconciler::new(
            appliance.as_ref(),
            &self.replica,
            features,
            &self.config.apply_order,
            dry_run,
        );
        let toggles = ToggleSynchronizer::new(appliance.as_ref(), &self.replica, features, dry_run);

        for kind in BEFORE_TOGGLES {
            entities.reconcile(kind, &self.origin, &current, &mut report.entities).await;
        }
        toggles.sync_all(&self.origin, &current, &mut report.toggles).await;
        for kind in AFTER_TOGGLES {
            entities.reconcile(kind, &self.origin, &current, &mut report.entities).await;
        }

        Ok(())
    }
}
