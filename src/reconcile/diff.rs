//! Keyed collection diff.
//!
//! Given the origin and replica collections of one entity kind, compute the
//! items to add, update and delete so that the replica converges to the
//! origin. The diff is stateless and never talks to an appliance.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

/// An entity with a stable identity key.
pub trait Keyed {
    type Key: Eq + Hash + Clone + Debug;

    /// Identity of the item within its collection.
    fn key(&self) -> Self::Key;

    /// True when every converging attribute matches. Replica-local
    /// attributes are not compared.
    fn same_as(&self, other: &Self) -> bool;

    /// Human readable identity for logs and reports.
    fn label(&self) -> String {
        format!("{:?}", self.key())
    }
}

/// An item present on both sides with differing attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Update<T> {
    /// The origin's version.
    pub desired: T,
    /// The replica's version.
    pub current: T,
}

/// Operations converging one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Diff<T> {
    pub to_add: Vec<T>,
    pub to_update: Vec<Update<T>>,
    pub to_delete: Vec<T>,
    /// Keys present on both sides with equal attributes.
    pub unchanged: usize,
}

impl<T> Default for Diff<T> {
    fn default() -> Self {
        Self {
            to_add: Vec::new(),
            to_update: Vec::new(),
            to_delete: Vec::new(),
            unchanged: 0,
        }
    }
}

impl<T> Diff<T> {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    pub fn operation_count(&self) -> usize {
        self.to_add.len() + self.to_update.len() + self.to_delete.len()
    }
}

/// Drop earlier duplicates, keeping the last item seen for each key. The
/// position of the first occurrence is kept.
pub fn dedup_last_wins<T: Keyed + Clone>(items: &[T]) -> Vec<T> {
    let mut index: HashMap<T::Key, usize> = HashMap::with_capacity(items.len());
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        match index.get(&item.key()) {
            Some(&pos) => out[pos] = item.clone(),
            None => {
                index.insert(item.key(), out.len());
                out.push(item.clone());
            }
        }
    }
    out
}

/// Compute the operations converging `replica` to `origin`.
///
/// With `protect_additional`, replica-only items are kept and nothing is
/// deleted.
pub fn diff<T: Keyed + Clone>(origin: &[T], replica: &[T], protect_additional: bool) -> Diff<T> {
    let origin = dedup_last_wins(origin);
    let replica = dedup_last_wins(replica);

    let replica_by_key: HashMap<T::Key, &T> = replica.iter().map(|r| (r.key(), r)).collect();
    let mut result = Diff::default();

    for item in &origin {
        match replica_by_key.get(&item.key()) {
            None => result.to_add.push(item.clone()),
            Some(current) if !item.same_as(current) => result.to_update.push(Update {
                desired: item.clone(),
                current: (*current).clone(),
            }),
            Some(_) => result.unchanged += 1,
        }
    }

    if !protect_additional {
        let origin_keys: HashSet<T::Key> = origin.iter().map(|o| o.key()).collect();
        result.to_delete = replica
            .into_iter()
            .filter(|r| !origin_keys.contains(&r.key()))
            .collect();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        key: &'static str,
        value: u32,
        local: u32,
    }

    fn item(key: &'static str, value: u32) -> Item {
        Item { key, value, local: 0 }
    }

    impl Keyed for Item {
        type Key = &'static str;

        fn key(&self) -> Self::Key {
            self.key
        }

        fn same_as(&self, other: &Self) -> bool {
            self.value == other.value
        }
    }

    fn keys(items: &[Item]) -> Vec<&'static str> {
        items.iter().map(|i| i.key).collect()
    }

    #[test]
    fn test_add_update_delete() {
        let origin = vec![item("a", 1), item("b", 1), item("c", 2)];
        let replica = vec![item("b", 1), item("c", 1), item("d", 1)];

        let d = diff(&origin, &replica, false);

        assert_eq!(keys(&d.to_add), vec!["a"]);
        assert_eq!(keys(&d.to_delete), vec!["d"]);
        assert_eq!(d.to_update.len(), 1);
        assert_eq!(d.to_update[0].desired, item("c", 2));
        assert_eq!(d.to_update[0].current, item("c", 1));
        assert_eq!(d.unchanged, 1);
    }

    #[test]
    fn test_protect_additional_keeps_replica_only() {
        let origin = vec![item("a", 1)];
        let replica = vec![item("a", 1), item("z", 1)];

        let d = diff(&origin, &replica, true);
        assert!(d.to_delete.is_empty());
        assert!(d.is_empty());
    }

    #[test]
    fn test_replica_local_attributes_ignored() {
        let origin = vec![Item { key: "a", value: 1, local: 1 }];
        let replica = vec![Item { key: "a", value: 1, local: 9 }];
        assert!(diff(&origin, &replica, false).is_empty());
    }

    #[test]
    fn test_duplicates_last_wins() {
        let origin = vec![item("a", 1), item("b", 1), item("a", 2)];
        let replica = vec![item("a", 2), item("b", 5), item("b", 1)];

        let deduped = dedup_last_wins(&origin);
        assert_eq!(deduped, vec![item("a", 2), item("b", 1)]);

        let d = diff(&origin, &replica, false);
        assert!(d.is_empty());
        assert_eq!(d.unchanged, 2);
    }

    #[test]
    fn test_identical_collections_are_idempotent() {
        let items = vec![item("a", 1), item("b", 2)];
        let d = diff(&items, &items, false);
        assert_eq!(d.operation_count(), 0);
    }

    #[test]
    fn test_convergence_of_applied_diff() {
        let origin = vec![item("a", 1), item("b", 2), item("c", 3)];
        let replica = vec![item("c", 0), item("x", 1), item("y", 1)];

        for protect in [false, true] {
            let d = diff(&origin, &replica, protect);
            let mut result: Vec<Item> = replica
                .iter()
                .filter(|r| !d.to_delete.contains(r))
                .map(|r| {
                    d.to_update
                        .iter()
                        .find(|u| u.current.key == r.key)
                        .map(|u| u.desired.clone())
                        .unwrap_or_else(|| r.clone())
                })
                .collect();
            result.extend(d.to_add.iter().cloned());

            let mut got = keys(&result);
            got.sort_unstable();
            if protect {
                assert_eq!(got, vec!["a", "b", "c", "x", "y"]);
            } else {
                assert_eq!(got, vec!["a", "b", "c"]);
            }
            assert!(diff(&origin, &result, protect).is_empty());
        }
    }
}
