//! DNS rewrite rules.

use serde::{Deserialize, Serialize};

use crate::reconcile::Keyed;

/// A single DNS rewrite. The whole entry is its identity, so a rewrite is
/// never updated in place: a changed answer is a delete plus an add.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RewriteEntry {
    pub domain: String,
    pub answer: String,
}

impl RewriteEntry {
    pub fn new(domain: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            answer: answer.into(),
        }
    }
}

impl Keyed for RewriteEntry {
    type Key = (String, String);

    fn key(&self) -> Self::Key {
        (self.domain.clone(), self.answer.clone())
    }

    fn same_as(&self, _other: &Self) -> bool {
        true
    }

    fn label(&self) -> String {
        format!("{} -> {}", self.domain, self.answer)
    }
}
