//! Globally blocked services.

use serde::{Deserialize, Serialize};

use crate::reconcile::Keyed;

/// A blocked service identifier such as `"youtube"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockedService(pub String);

impl BlockedService {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl Keyed for BlockedService {
    type Key = String;

    fn key(&self) -> String {
        self.0.clone()
    }

    fn same_as(&self, _other: &Self) -> bool {
        true
    }

    fn label(&self) -> String {
        self.0.clone()
    }
}
