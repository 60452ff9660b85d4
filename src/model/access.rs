//! Access lists.

use serde::{Deserialize, Serialize};

use crate::model::{null_as_default, sorted};

/// Allowed clients, disallowed clients and blocked hosts. Not diffed by
/// key: the whole document is replaced when it differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AccessList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub allowed_clients: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub disallowed_clients: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub blocked_hosts: Vec<String>,
}

impl AccessList {
    /// Order-insensitive comparison.
    pub fn equivalent(&self, other: &AccessList) -> bool {
        sorted(&self.allowed_clients) == sorted(&other.allowed_clients)
            && sorted(&self.disallowed_clients) == sorted(&other.disallowed_clients)
            && sorted(&self.blocked_hosts) == sorted(&other.blocked_hosts)
    }
}
