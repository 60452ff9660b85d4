//! Filter-list subscriptions and the filtering status document.

use serde::{Deserialize, Serialize};

use crate::model::null_as_default;
use crate::reconcile::Keyed;

/// A filter-list subscription, identified by its URL.
///
/// `id`, `rules_count` and `last_updated` are assigned by each appliance and
/// are never compared between origin and replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Filter {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub rules_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl Filter {
    pub fn new(name: impl Into<String>, url: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            enabled,
            ..Default::default()
        }
    }
}

impl Keyed for Filter {
    type Key = String;

    fn key(&self) -> String {
        self.url.clone()
    }

    fn same_as(&self, other: &Self) -> bool {
        self.name == other.name && self.enabled == other.enabled
    }

    fn label(&self) -> String {
        self.url.clone()
    }
}

/// Response of `GET /filtering/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FilteringStatus {
    #[serde(default)]
    pub enabled: bool,
    /// Update interval in hours.
    #[serde(default)]
    pub interval: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub filters: Vec<Filter>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub whitelist_filters: Vec<Filter>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_rules: Vec<String>,
}

impl FilteringStatus {
    /// The list of one polarity.
    pub fn list(&self, whitelist: bool) -> &[Filter] {
        if whitelist {
            &self.whitelist_filters
        } else {
            &self.filters
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_lists_decode_as_empty() {
        let status: FilteringStatus = serde_json::from_str(
            r#"{"enabled":true,"interval":24,"filters":null,"whitelist_filters":null,"user_rules":null}"#,
        )
        .unwrap();
        assert!(status.filters.is_empty());
        assert!(status.user_rules.is_empty());
        assert_eq!(status.interval, 24);
    }

    #[test]
    fn test_replica_local_fields_ignored() {
        let origin = Filter {
            id: 1,
            rules_count: 10,
            ..Filter::new("ads", "https://lists/ads.txt", true)
        };
        let replica = Filter {
            id: 7,
            rules_count: 99,
            last_updated: Some("2024-01-01T00:00:00Z".into()),
            ..Filter::new("ads", "https://lists/ads.txt", true)
        };
        assert!(origin.same_as(&replica));

        let disabled = Filter::new("ads", "https://lists/ads.txt", false);
        assert!(!origin.same_as(&disabled));
    }
}
