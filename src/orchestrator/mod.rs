//! Orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator::run_once
//!     → connect + fetch origin snapshot (once, never provisioned)
//!     → Arc<Snapshot> shared read-only with every worker
//!     → JoinSet of ReplicaWorkers, bounded by a semaphore
//!         → worker.rs (fetch → entities → toggles → leases)
//!     → RunReport (replicas in configuration order)
//! ```
//!
//! # Design Decisions
//! - A failure anywhere in one replica never affects another replica
//! - One absolute deadline bounds the whole run, including origin fetch
//! - No state survives a run; the next run re-derives everything

pub mod report;
pub mod worker;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::observability::metrics;
use crate::remote::Connector;
use crate::snapshot::{fetch_snapshot, Snapshot, SyncError};

pub use report::{ReplicaReport, ReplicaStatus, RunReport};
pub use worker::ReplicaWorker;

/// Drives sync runs for one configuration.
pub struct Orchestrator {
    config: Arc<SyncConfig>,
    connector: Arc<dyn Connector>,
}

impl Orchestrator {
    pub fn new(config: SyncConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
        }
    }

    /// Execute one full run.
    pub async fn run_once(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", run_id = %run_id, dry_run = self.config.run.dry_run);
        self.run(run_id).instrument(span).await
    }

    async fn run(&self, run_id: Uuid) -> RunReport {
        let started = std::time::Instant::now();
        let started_at_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let deadline = Instant::now() + Duration::from_secs(self.config.run.deadline_secs);

        tracing::info!(replicas = self.config.replicas.len(), "Sync run starting");

        let mut report = RunReport {
            run_id,
            dry_run: self.config.run.dry_run,
            started_at_unix,
            duration_ms: 0,
            origin_error: None,
            replicas: Vec::new(),
        };

        match self.fetch_origin(deadline).await {
            Ok(origin) => report.replicas = self.run_replicas(Arc::new(origin), deadline).await,
            Err(e) => {
                tracing::error!(error = %e, "Origin snapshot unavailable, no replica touched");
                report.origin_error = Some(e.to_string());
            }
        }

        let elapsed = started.elapsed();
        report.duration_ms = elapsed.as_millis() as u64;
        metrics::record_run_duration(elapsed);

        tracing::info!(
            success = report.is_success(),
            duration_ms = report.duration_ms,
            "Sync run finished"
        );
        report
    }

    async fn fetch_origin(&self, deadline: Instant) -> Result<Snapshot, SyncError> {
        let origin = &self.config.origin;
        let appliance = self.connector.connect(origin).map_err(SyncError::Validation)?;
        let features = self.config.origin_features();

        tokio::time::timeout_at(deadline, fetch_snapshot(appliance.as_ref(), origin, &features, false))
            .await
            .map_err(|_| SyncError::DeadlineExceeded)?
    }

    async fn run_replicas(&self, origin: Arc<Snapshot>, deadline: Instant) -> Vec<ReplicaReport> {
        let permits = Arc::new(Semaphore::new(self.config.run.concurrency.max(1)));
        let mut join_set: JoinSet<(usize, ReplicaReport)> = JoinSet::new();

        for (index, replica) in self.config.replicas.iter().enumerate() {
            let worker = ReplicaWorker {
                config: self.config.clone(),
                connector: self.connector.clone(),
                replica: replica.clone(),
                origin: origin.clone(),
            };
            let permits = permits.clone();
            join_set.spawn(
                async move {
                    let _permit = permits.acquire_owned().await.ok();
                    (index, worker.run(deadline).await)
                }
                .in_current_span(),
            );
        }

        let mut slots: Vec<Option<ReplicaReport>> = vec![None; self.config.replicas.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, replica_report)) => slots[index] = Some(replica_report),
                Err(e) => tracing::error!(error = %e, "Replica worker task failed"),
            }
        }

        slots
            .into_iter()
            .zip(&self.config.replicas)
            .map(|(slot, replica)| {
                slot.unwrap_or_else(|| {
                    let mut failed = ReplicaReport::new(replica.url.clone());
                    failed.status = ReplicaStatus::Failed;
                    failed.fatal_error = Some("replica worker task failed".to_string());
                    metrics::record_replica(failed.status.as_str());
                    failed
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstanceConfig;
    use crate::model::RewriteEntry;
    use crate::remote::{FakeAppliance, FakeConnector, RemoteError};

    fn setup(replicas: usize) -> (SyncConfig, Arc<FakeAppliance>, Vec<Arc<FakeAppliance>>, FakeConnector) {
        let mut connector = FakeConnector::new();
        let origin = Arc::new(FakeAppliance::new("origin"));
        connector.register("http://origin", origin.clone());

        let mut config = SyncConfig {
            origin: InstanceConfig::new("http://origin"),
            ..Default::default()
        };
        let mut fakes = Vec::new();
        for i in 0..replicas {
            let url = format!("http://replica{}", i);
            let fake = Arc::new(FakeAppliance::new(url.clone()));
            connector.register(url.clone(), fake.clone());
            config.replicas.push(InstanceConfig::new(url));
            fakes.push(fake);
        }
        (config, origin, fakes, connector)
    }

    #[tokio::test]
    async fn test_origin_failure_touches_no_replica() {
        let (config, origin, replicas, connector) = setup(1);
        origin.fail_when("get status", RemoteError::Transport("refused".into()));

        let report = Orchestrator::new(config, Arc::new(connector)).run_once().await;

        assert!(report.origin_error.is_some());
        assert!(report.replicas.is_empty());
        assert!(!report.is_success());
        assert!(replicas[0].calls().is_empty());
    }

    #[tokio::test]
    async fn test_replicas_reported_in_config_order() {
        let (config, origin, _replicas, connector) = setup(3);
        origin.update_state(|s| s.rewrites.push(RewriteEntry::new("a.lan", "10.0.0.1")));

        let report = Orchestrator::new(config, Arc::new(connector)).run_once().await;

        let hosts: Vec<&str> = report.replicas.iter().map(|r| r.host.as_str()).collect();
        assert_eq!(hosts, vec!["http://replica0", "http://replica1", "http://replica2"]);
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_origin_fetched_once() {
        let (config, origin, _replicas, connector) = setup(2);

        Orchestrator::new(config, Arc::new(connector)).run_once().await;

        let status_reads = origin.calls().iter().filter(|c| *c == "get status").count();
        assert_eq!(status_reads, 1);
        assert!(origin.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_replica_fails_alone() {
        let (mut config, _origin, replicas, connector) = setup(1);
        config.replicas.push(InstanceConfig::new("http://missing"));

        let report = Orchestrator::new(config, Arc::new(connector)).run_once().await;

        assert_eq!(report.replicas[0].status, ReplicaStatus::Succeeded);
        assert_eq!(report.replicas[1].status, ReplicaStatus::Failed);
        assert!(!replicas[0].calls().is_empty());
    }
}
