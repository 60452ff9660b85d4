//! Run and replica reports.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::model::EntityKind;
use crate::reconcile::{EntityReport, ToggleOutcome, ToggleReport};
use crate::snapshot::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaStatus {
    /// Every operation and toggle succeeded.
    Succeeded,
    /// Some item or toggle failed, or the run deadline cut processing short.
    Partial,
    /// Nothing could be reconciled (invalid config, fetch or setup failure).
    Failed,
}

impl ReplicaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicaStatus::Succeeded => "succeeded",
            ReplicaStatus::Partial => "partial",
            ReplicaStatus::Failed => "failed",
        }
    }
}

/// Outcome of one replica within a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicaReport {
    pub host: String,
    pub status: ReplicaStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
    pub entities: BTreeMap<EntityKind, EntityReport>,
    pub toggles: Vec<ToggleReport>,
}

impl ReplicaReport {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            status: ReplicaStatus::Succeeded,
            fatal_error: None,
            entities: BTreeMap::new(),
            toggles: Vec::new(),
        }
    }

    /// Settle the status from what was recorded. `error` is the reason
    /// processing stopped early, if it did.
    pub fn finish(&mut self, error: Option<SyncError>) {
        self.status = match &error {
            Some(SyncError::DeadlineExceeded) => ReplicaStatus::Partial,
            Some(_) => ReplicaStatus::Failed,
            None if self.failure_count() > 0 => ReplicaStatus::Partial,
            None => ReplicaStatus::Succeeded,
        };
        self.fatal_error = error.map(|e| e.to_string());
    }

    /// Failed item operations plus failed toggles.
    pub fn failure_count(&self) -> usize {
        let items: usize = self.entities.values().map(|e| e.failed).sum();
        let toggles = self.toggles.iter().filter(|t| t.outcome.is_failure()).count();
        items + toggles
    }

    /// Operations performed, or planned in a dry run.
    pub fn change_count(&self) -> usize {
        let items: usize = self.entities.values().map(EntityReport::operation_count).sum();
        let toggles = self
            .toggles
            .iter()
            .filter(|t| matches!(t.outcome, ToggleOutcome::Changed | ToggleOutcome::WouldChange))
            .count();
        items + toggles
    }

    pub fn is_success(&self) -> bool {
        self.status == ReplicaStatus::Succeeded
    }
}

/// Aggregate result of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub started_at_unix: u64,
    pub duration_ms: u64,
    /// Set when the origin could not be read; no replica is touched then.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_error: Option<String>,
    pub replicas: Vec<ReplicaReport>,
}

impl RunReport {
    /// True when the origin was read and every replica fully succeeded.
    pub fn is_success(&self) -> bool {
        self.origin_error.is_none() && self.replicas.iter().all(ReplicaReport::is_success)
    }

    pub fn replica(&self, host: &str) -> Option<&ReplicaReport> {
        self.replicas.iter().find(|r| r.host == host)
    }
}
