//! Canonical display order for items.

use std::cmp::Ordering;

use super::Item;

/// Total order used by every query.
///
/// Tiers: status (in progress, not started, done), then kind (must-do
/// first), then start time (anchored items first, earlier first), then id.
/// Two items only compare equal when their ids are equal.
pub fn compare_items(a: &Item, b: &Item) -> Ordering {
    a.status
        .rank()
        .cmp(&b.status.rank())
        .then_with(|| a.kind.rank().cmp(&b.kind.rank()))
        .then_with(|| match (a.start_time, b.start_time) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort items in place by [`compare_items`].
pub fn sort_items(items: &mut [Item]) {
    items.sort_by(compare_items);
}
