//! Immutable todo list snapshot.

use std::ops::Deref;
use std::sync::Arc;

/// The complete ordered list as of one revision.
///
/// Cloning is cheap (`Arc`-backed), so observers can hold on to a snapshot
/// while the container moves on to newer revisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoSnapshot {
    items: Arc<[String]>,
    revision: u64,
}

impl TodoSnapshot {
    /// Empty list at revision 0.
    pub fn empty() -> Self {
        Self::from_items(Vec::new(), 0)
    }

    pub fn from_items(items: Vec<String>, revision: u64) -> Self {
        Self {
            items: items.into(),
            revision,
        }
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Increases by one on every replacement of the container's snapshot.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.items.to_vec()
    }

    /// Returns the list with `item` added at the end.
    pub fn appended(&self, item: String) -> Self {
        let mut items = Vec::with_capacity(self.items.len() + 1);
        items.extend_from_slice(&self.items);
        items.push(item);
        Self::from_items(items, self.revision + 1)
    }

    /// Returns the list without the element at `position`, or `None` when
    /// `position` is out of bounds.
    pub fn removed_at(&self, position: usize) -> Option<Self> {
        if position >= self.items.len() {
            return None;
        }
        let items = self
            .items
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != position)
            .map(|(_, item)| item.clone())
            .collect();
        Some(Self::from_items(items, self.revision + 1))
    }

    /// Returns `items` installed as the next revision.
    pub fn replaced_with(&self, items: Vec<String>) -> Self {
        Self::from_items(items, self.revision + 1)
    }
}

impl Default for TodoSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl Deref for TodoSnapshot {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl PartialEq<[&str]> for TodoSnapshot {
    fn eq(&self, other: &[&str]) -> bool {
        self.items.len() == other.len()
            && self.items.iter().zip(other).all(|(left, right)| left == right)
    }
}

impl<const N: usize> PartialEq<[&str; N]> for TodoSnapshot {
    fn eq(&self, other: &[&str; N]) -> bool {
        *self == other[..]
    }
}

#[cfg(test)]
mod tests {
    use super::TodoSnapshot;
    use proptest::prelude::*;

    fn snapshot(items: &[&str]) -> TodoSnapshot {
        TodoSnapshot::from_items(items.iter().map(|item| item.to_string()).collect(), 0)
    }

    #[test]
    fn empty_snapshot_is_distinguishable() {
        let empty = TodoSnapshot::empty();
        assert!(empty.is_empty());
        assert_eq!(empty.revision(), 0);
        assert!(!snapshot(&["a"]).is_empty());
    }

    #[test]
    fn appended_keeps_duplicates() {
        let next = snapshot(&["a"]).appended("a".to_string());
        assert_eq!(next, ["a", "a"]);
        assert_eq!(next.revision(), 1);
    }

    #[test]
    fn removed_at_middle_keeps_neighbours_in_order() {
        let next = snapshot(&["a", "b", "c"]).removed_at(1).unwrap();
        assert_eq!(next, ["a", "c"]);
    }

    #[test]
    fn removed_at_out_of_bounds_is_none() {
        assert!(snapshot(&["a"]).removed_at(5).is_none());
        assert!(TodoSnapshot::empty().removed_at(0).is_none());
    }

    #[test]
    fn transitions_leave_source_untouched() {
        let source = snapshot(&["a", "b"]);
        let _ = source.appended("c".to_string());
        let _ = source.removed_at(0);
        assert_eq!(source, ["a", "b"]);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn append_adds_exactly_one_item_at_the_end(
            items in prop::collection::vec(".*", 0..16),
            item in ".*",
        ) {
            let before = TodoSnapshot::from_items(items.clone(), 3);
            let after = before.appended(item.clone());

            prop_assert_eq!(after.len(), items.len() + 1);
            prop_assert_eq!(&after[..items.len()], &items[..]);
            prop_assert_eq!(after.last(), Some(&item));
        }

        #[test]
        fn remove_preserves_relative_order_of_survivors(
            (items, position) in prop::collection::vec(".*", 1..16)
                .prop_flat_map(|items| {
                    let len = items.len();
                    (Just(items), 0..len)
                }),
        ) {
            let before = TodoSnapshot::from_items(items.clone(), 0);
            let after = before.removed_at(position).unwrap();

            let mut expected = items;
            expected.remove(position);
            prop_assert_eq!(after.to_vec(), expected);
        }
    }
}
