use serde::{Deserialize, Serialize};

use crate::item::{Item, ItemId};

/// Every successful item store mutation produces an Event.
/// Views and the widget subscribe to them instead of polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    ItemAdded { item: Item },
    ItemUpdated { item: Item },
    ItemDeleted { id: ItemId },
}

impl Event {
    /// Id of the item this event concerns.
    pub fn item_id(&self) -> &str {
        match self {
            Event::ItemAdded { item } | Event::ItemUpdated { item } => &item.id,
            Event::ItemDeleted { id } => id,
        }
    }
}
