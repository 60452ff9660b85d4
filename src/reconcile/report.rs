//! Per entity kind results.

use serde::Serialize;

use crate::reconcile::apply::{ApplyResult, Operation};
use crate::reconcile::diff::Diff;

/// A failed item operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemError {
    pub op: Operation,
    pub key: String,
    pub message: String,
}

/// Counts for one entity kind on one replica. In dry-run mode the counts are
/// the planned operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityReport {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ItemError>,
}

impl EntityReport {
    /// Operations a diff would perform.
    pub fn planned<T>(diff: &Diff<T>) -> Self {
        Self {
            added: diff.to_add.len(),
            updated: diff.to_update.len(),
            deleted: diff.to_delete.len(),
            unchanged: diff.unchanged,
            ..Default::default()
        }
    }

    /// Operations that actually succeeded or failed.
    pub fn applied<T>(diff: &Diff<T>, result: &ApplyResult) -> Self {
        let mut report = Self {
            added: result.succeeded(Operation::Add),
            updated: result.succeeded(Operation::Update),
            deleted: result.succeeded(Operation::Delete),
            unchanged: diff.unchanged,
            ..Default::default()
        };
        report.absorb_failures(result);
        report
    }

    /// Add the failures of a follow-up pass (e.g. filter refresh).
    pub fn absorb_failures(&mut self, result: &ApplyResult) {
        for outcome in result.failures() {
            self.failed += 1;
            self.errors.push(ItemError {
                op: outcome.op,
                key: outcome.key.clone(),
                message: outcome.error.clone().unwrap_or_default(),
            });
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn operation_count(&self) -> usize {
        self.added + self.updated + self.deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;
    use crate::remote::RemoteError;

    #[test]
    fn test_applied_counts() {
        let diff: Diff<u8> = Diff {
            to_add: vec![1, 2, 3],
            unchanged: 4,
            ..Default::default()
        };
        let mut result = ApplyResult::default();
        result.record(EntityKind::Clients, Operation::Add, "1".into(), Ok(()));
        result.record(
            EntityKind::Clients,
            Operation::Add,
            "2".into(),
            Err(RemoteError::Transport("reset".into())),
        );
        result.record(EntityKind::Clients, Operation::Add, "3".into(), Ok(()));

        let report = EntityReport::applied(&diff, &result);
        assert_eq!(report.added, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.unchanged, 4);
        assert_eq!(report.errors[0].key, "2");
        assert!(report.errors[0].message.contains("reset"));
    }
}
