//! Home-screen widget data.
//!
//! The widget renders elsewhere; this module only decides what it shows:
//! the category of "now" and the first few of today's items in it.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::TimeMathError;
use crate::item::query::items_for_category;
use crate::item::{Category, Item, ItemStore};
use crate::window::{active_window, DayWindow, TimeWindowConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetSnapshot {
    pub taken_at: NaiveDateTime,
    pub category: Category,
    pub window: DayWindow,
    /// Today's items in `category`, open items first, at most the limit.
    pub items: Vec<Item>,
    /// Open items in `category`, including those cut by the limit.
    pub open_count: usize,
}

impl WidgetSnapshot {
    pub fn build(
        store: &ItemStore,
        windows: &TimeWindowConfig,
        now: NaiveDateTime,
        limit: usize,
    ) -> Result<Self, TimeMathError> {
        let window = active_window(now, windows.rollover_time())?;
        let category = windows.current_category(now);
        let mut items = items_for_category(store, category, None, &window);
        let open_count = items.iter().filter(|i| !i.is_done()).count();
        items.truncate(limit);

        Ok(Self {
            taken_at: now,
            category,
            window,
            items,
            open_count,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
