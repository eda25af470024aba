use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::Item;

/// Last confirmed view of a feed, oldest item first.
///
/// Ids are unique; constructors drop repeated ids so the invariant holds for
/// any input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Item>", into = "Vec<Item>")]
pub struct FeedSnapshot {
    items: Vec<Item>,
    positions: HashMap<String, usize>,
}

impl FeedSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from items in ascending chronological order. The first
    /// occurrence of a repeated id wins.
    pub fn from_ascending(items: impl IntoIterator<Item = Item>) -> Self {
        let mut snapshot = Self::new();
        for item in items {
            snapshot.push(item);
        }
        snapshot
    }

    /// Build from a live listing (newest first). The newest occurrence of a
    /// repeated id wins.
    pub fn from_newest_first(live: &[Item]) -> Self {
        let mut seen = std::collections::HashSet::new();
        let mut newest_first: Vec<Item> = live
            .iter()
            .filter(|item| seen.insert(item.id.as_str()))
            .cloned()
            .collect();
        newest_first.reverse();
        Self::from_ascending(newest_first)
    }

    fn push(&mut self, item: Item) {
        if self.positions.contains_key(&item.id) {
            return;
        }
        self.positions.insert(item.id.clone(), self.items.len());
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Ascending position of `id` (0 = oldest).
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// The `n`-th newest item (0 = newest).
    pub fn nth_newest(&self, n: usize) -> Option<&Item> {
        self.items.len().checked_sub(n + 1).map(|idx| &self.items[idx])
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id.as_str()).collect()
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }
}

impl PartialEq for FeedSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl Eq for FeedSnapshot {}

impl From<Vec<Item>> for FeedSnapshot {
    fn from(items: Vec<Item>) -> Self {
        Self::from_ascending(items)
    }
}

impl From<FeedSnapshot> for Vec<Item> {
    fn from(snapshot: FeedSnapshot) -> Self {
        snapshot.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item(id: &str) -> Item {
        Item::new(id, id.to_uppercase(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn from_newest_first_reverses_into_ascending_order() {
        let snapshot = FeedSnapshot::from_newest_first(&[item("c"), item("b"), item("a")]);
        assert_eq!(snapshot.ids(), vec!["a", "b", "c"]);
        assert_eq!(snapshot.nth_newest(0).map(|i| i.id.as_str()), Some("c"));
        assert_eq!(snapshot.nth_newest(2).map(|i| i.id.as_str()), Some("a"));
        assert!(snapshot.nth_newest(3).is_none());
    }

    #[test]
    fn repeated_ids_are_dropped() {
        let snapshot = FeedSnapshot::from_ascending(vec![item("a"), item("b"), item("a")]);
        assert_eq!(snapshot.ids(), vec!["a", "b"]);
        assert_eq!(snapshot.position("b"), Some(1));

        let live = FeedSnapshot::from_newest_first(&[item("b"), item("a"), item("b")]);
        assert_eq!(live.ids(), vec!["a", "b"]);
    }
}
