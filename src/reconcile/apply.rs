//! Applying a diff to a replica.
//!
//! Items are applied one by one. A failing item is recorded and the rest of
//! the batch is still attempted; the caller gets every outcome back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::EntityKind;
use crate::observability::metrics;
use crate::reconcile::diff::{Diff, Keyed, Update};
use crate::remote::RemoteResult;

/// Whether deletions run before or after additions. Updates always run
/// last since they only touch keys present on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOrder {
    /// Free identities before re-creating them (URL, MAC or domain reuse).
    #[default]
    DeleteFirst,
    AddFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Add,
    Update,
    Delete,
    Refresh,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Refresh => "refresh",
        }
    }
}

/// Mutations of one entity kind on one replica.
#[async_trait]
pub trait ItemSink<T: Sync>: Send + Sync {
    async fn add(&self, item: &T) -> RemoteResult<()>;
    async fn update(&self, update: &Update<T>) -> RemoteResult<()>;
    async fn delete(&self, item: &T) -> RemoteResult<()>;
}

/// Result of one item operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    pub op: Operation,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Every outcome of one apply pass, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyResult {
    pub outcomes: Vec<ItemOutcome>,
}

impl ApplyResult {
    pub fn succeeded(&self, op: Operation) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.op == op && o.is_success())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Record an outcome, logging and counting it.
    pub fn record(&mut self, kind: EntityKind, op: Operation, key: String, result: RemoteResult<()>) {
        let error = match result {
            Ok(()) => {
                tracing::info!(kind = %kind, op = op.as_str(), key = %key, "Applied");
                None
            }
            Err(e) => {
                tracing::warn!(kind = %kind, op = op.as_str(), key = %key, error = %e, "Apply failed");
                Some(e.to_string())
            }
        };
        metrics::record_operation(kind, op, error.is_none());
        self.outcomes.push(ItemOutcome { op, key, error });
    }
}

/// Apply `diff` through `sink`, best effort.
pub async fn apply<T, S>(sink: &S, kind: EntityKind, diff: &Diff<T>, order: ApplyOrder) -> ApplyResult
where
    T: Keyed + Sync,
    S: ItemSink<T> + ?Sized,
{
    let mut result = ApplyResult::default();

    match order {
        ApplyOrder::DeleteFirst => {
            apply_deletes(sink, kind, &diff.to_delete, &mut result).await;
            apply_adds(sink, kind, &diff.to_add, &mut result).await;
        }
        ApplyOrder::AddFirst => {
            apply_adds(sink, kind, &diff.to_add, &mut result).await;
            apply_deletes(sink, kind, &diff.to_delete, &mut result).await;
        }
    }

    for update in &diff.to_update {
        let outcome = sink.update(update).await;
        result.record(kind, Operation::Update, update.desired.label(), outcome);
    }

    result
}

async fn apply_adds<T, S>(sink: &S, kind: EntityKind, items: &[T], result: &mut ApplyResult)
where
    T: Keyed + Sync,
    S: ItemSink<T> + ?Sized,
{
    for item in items {
        let outcome = sink.add(item).await;
        result.record(kind, Operation::Add, item.label(), outcome);
    }
}

async fn apply_deletes<T, S>(sink: &S, kind: EntityKind, items: &[T], result: &mut ApplyResult)
where
    T: Keyed + Sync,
    S: ItemSink<T> + ?Sized,
{
    for item in items {
        let outcome = sink.delete(item).await;
        result.record(kind, Operation::Delete, item.label(), outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::diff::diff;
    use crate::remote::RemoteError;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(&'static str, u32);

    impl Keyed for Item {
        type Key = &'static str;

        fn key(&self) -> Self::Key {
            self.0
        }

        fn same_as(&self, other: &Self) -> bool {
            self.1 == other.1
        }

        fn label(&self) -> String {
            self.0.to_string()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        log: Mutex<Vec<String>>,
        fail: Vec<&'static str>,
    }

    impl RecordingSink {
        fn run(&self, op: &str, key: &'static str) -> RemoteResult<()> {
            self.log.lock().unwrap().push(format!("{} {}", op, key));
            if self.fail.contains(&key) {
                Err(RemoteError::Api {
                    status: 500,
                    body: "boom".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ItemSink<Item> for RecordingSink {
        async fn add(&self, item: &Item) -> RemoteResult<()> {
            self.run("add", item.0)
        }

        async fn update(&self, update: &Update<Item>) -> RemoteResult<()> {
            self.run("update", update.desired.0)
        }

        async fn delete(&self, item: &Item) -> RemoteResult<()> {
            self.run("delete", item.0)
        }
    }

    #[tokio::test]
    async fn test_delete_first_order() {
        let sink = RecordingSink::default();
        let d = diff(&[Item("a", 1), Item("c", 2)], &[Item("c", 1), Item("d", 1)], false);

        let result = apply(&sink, EntityKind::DnsRewrites, &d, ApplyOrder::DeleteFirst).await;

        assert_eq!(*sink.log.lock().unwrap(), vec!["delete d", "add a", "update c"]);
        assert_eq!(result.succeeded(Operation::Add), 1);
        assert_eq!(result.succeeded(Operation::Update), 1);
        assert_eq!(result.succeeded(Operation::Delete), 1);
        assert_eq!(result.failed(), 0);
    }

    #[tokio::test]
    async fn test_add_first_order() {
        let sink = RecordingSink::default();
        let d = diff(&[Item("a", 1)], &[Item("d", 1)], false);

        apply(&sink, EntityKind::Clients, &d, ApplyOrder::AddFirst).await;

        assert_eq!(*sink.log.lock().unwrap(), vec!["add a", "delete d"]);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_batch() {
        let sink = RecordingSink {
            fail: vec!["b"],
            ..Default::default()
        };
        let d = diff(&[Item("a", 1), Item("b", 1), Item("c", 1)], &[], false);

        let result = apply(&sink, EntityKind::Clients, &d, ApplyOrder::DeleteFirst).await;

        assert_eq!(sink.log.lock().unwrap().len(), 3);
        assert_eq!(result.succeeded(Operation::Add), 2);
        assert_eq!(result.failed(), 1);
        let failure = result.failures().next().unwrap();
        assert_eq!(failure.key, "b");
        assert_eq!(failure.op, Operation::Add);
    }
}
