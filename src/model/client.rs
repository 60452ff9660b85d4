//! Persistent client profiles.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{null_as_default, sorted};
use crate::reconcile::Keyed;

/// A client profile, identified by its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Client {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ids: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub use_global_settings: bool,
    #[serde(default)]
    pub filtering_enabled: bool,
    #[serde(default)]
    pub parental_enabled: bool,
    #[serde(default)]
    pub safebrowsing_enabled: bool,
    #[serde(default)]
    pub safesearch_enabled: bool,
    #[serde(default)]
    pub use_global_blocked_services: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub blocked_services: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub upstreams: Vec<String>,
    #[serde(default)]
    pub ignore_querylog: bool,
    #[serde(default)]
    pub ignore_statistics: bool,
    /// Fields not modelled above, carried through so an update never resets
    /// them on the replica.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Client {
    pub fn new(name: impl Into<String>, ids: &[&str]) -> Self {
        Self {
            name: name.into(),
            ids: ids.iter().map(|s| s.to_string()).collect(),
            use_global_settings: true,
            use_global_blocked_services: true,
            ..Default::default()
        }
    }
}

impl Keyed for Client {
    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }

    /// Ids, tags and blocked services are sets; upstream order is significant.
    fn same_as(&self, other: &Self) -> bool {
        sorted(&self.ids) == sorted(&other.ids)
            && sorted(&self.tags) == sorted(&other.tags)
            && sorted(&self.blocked_services) == sorted(&other.blocked_services)
            && self.upstreams == other.upstreams
            && self.use_global_settings == other.use_global_settings
            && self.filtering_enabled == other.filtering_enabled
            && self.parental_enabled == other.parental_enabled
            && self.safebrowsing_enabled == other.safebrowsing_enabled
            && self.safesearch_enabled == other.safesearch_enabled
            && self.use_global_blocked_services == other.use_global_blocked_services
            && self.ignore_querylog == other.ignore_querylog
            && self.ignore_statistics == other.ignore_statistics
            && self.extra == other.extra
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

/// Response of `GET /clients`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Clients {
    #[serde(default, deserialize_with = "null_as_default")]
    pub clients: Vec<Client>,
}
