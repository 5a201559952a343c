//! Day-scoped views over the store.
//!
//! An item belongs to "today" when its start time falls inside the active
//! window, or when it has no start time at all.

use super::store::ItemStore;
use super::{Category, Item, Kind};
use crate::window::DayWindow;

fn in_day(item: &Item, window: &DayWindow) -> bool {
    item.start_time.map_or(true, |t| window.contains(t))
}

fn kind_matches(item: &Item, kind: Option<Kind>) -> bool {
    kind.map_or(true, |k| item.kind == k)
}

/// Everything planned for the active day, in canonical order.
pub fn today_items(store: &ItemStore, window: &DayWindow) -> Vec<Item> {
    store.query(|i| in_day(i, window))
}

/// Today's items in one category, optionally narrowed to one kind.
pub fn items_for_category(
    store: &ItemStore,
    category: Category,
    kind: Option<Kind>,
    window: &DayWindow,
) -> Vec<Item> {
    store.query(|i| i.category == Some(category) && kind_matches(i, kind) && in_day(i, window))
}

/// Items with no category.
pub fn uncategorized(store: &ItemStore, kind: Option<Kind>) -> Vec<Item> {
    store.query(|i| i.category.is_none() && kind_matches(i, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::item::MemoryPersistence;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::sync::Arc;

    fn at(day: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, day)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn window() -> DayWindow {
        DayWindow {
            start: at(17, 6),
            end: at(18, 6),
        }
    }

    fn seeded() -> ItemStore {
        let clock = Arc::new(FixedClock::new(at(17, 10)));
        let mut store = ItemStore::open(Box::new(MemoryPersistence::new()), clock);

        let mut inside = Item::new("standup", Kind::MustDo, at(17, 7))
            .with_category(Some(Category::Morning));
        inside.start_time = Some(at(17, 8));
        inside.calendar_event_id = Some("evt-1".into());
        store.add(inside).unwrap();

        let mut outside = Item::new("offsite", Kind::MustDo, at(17, 7))
            .with_category(Some(Category::Morning));
        outside.start_time = Some(at(19, 8));
        outside.calendar_event_id = Some("evt-2".into());
        store.add(outside).unwrap();

        store
            .add(Item::new("stretch", Kind::WantTo, at(17, 7)).with_category(Some(Category::Morning)))
            .unwrap();
        store.add(Item::new("backlog", Kind::WantTo, at(10, 7))).unwrap();
        store
    }

    #[test]
    fn today_includes_undated_and_in_window() {
        let store = seeded();
        let mut titles: Vec<_> = today_items(&store, &window())
            .into_iter()
            .map(|i| i.title)
            .collect();
        assert_eq!(titles.len(), 3);
        assert_eq!(titles.remove(0), "standup");
        titles.sort();
        assert_eq!(titles, ["backlog", "stretch"]);
    }

    #[test]
    fn category_view_filters_kind() {
        let store = seeded();
        let all = items_for_category(&store, Category::Morning, None, &window());
        assert_eq!(all.len(), 2);

        let want = items_for_category(&store, Category::Morning, Some(Kind::WantTo), &window());
        assert_eq!(want.len(), 1);
        assert_eq!(want[0].title, "stretch");
    }

    #[test]
    fn uncategorized_lists_backlog() {
        let store = seeded();
        let items = uncategorized(&store, None);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "backlog");
        assert!(uncategorized(&store, Some(Kind::MustDo)).is_empty());
    }
}
