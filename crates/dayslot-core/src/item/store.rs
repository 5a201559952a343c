//! In-memory item collection with write-through persistence.
//!
//! The store is the single owner of item state. Every mutation is applied
//! in memory first and then the whole collection is handed to the
//! [`ItemPersistence`] collaborator. A failed save is logged and otherwise
//! ignored: the in-memory state stays authoritative for the session and the
//! next successful save wins.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::ordering::sort_items;
use super::{Category, Item, ItemId, LinkKind, Status};
use crate::clock::Clock;
use crate::error::{CoreError, Result, ValidationError};
use crate::events::Event;

/// Load/save collaborator for the full item collection.
pub trait ItemPersistence: Send {
    fn load_all(&self) -> Result<Vec<Item>>;
    fn save_all(&self, items: &[Item]) -> Result<()>;
}

/// Persistence held in memory. Clones share the same backing list.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    items: Arc<Mutex<Vec<Item>>>,
    fail_saves: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<Item>) -> Self {
        let p = Self::default();
        if let Ok(mut guard) = p.items.lock() {
            *guard = items;
        }
        p
    }

    /// Make every following save fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Snapshot of what was last saved.
    pub fn saved(&self) -> Vec<Item> {
        self.items.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl ItemPersistence for MemoryPersistence {
    fn load_all(&self) -> Result<Vec<Item>> {
        self.items
            .lock()
            .map(|g| g.clone())
            .map_err(|e| CoreError::Custom(format!("memory persistence poisoned: {e}")))
    }

    fn save_all(&self, items: &[Item]) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CoreError::Custom("save rejected".into()));
        }
        let mut guard = self
            .items
            .lock()
            .map_err(|e| CoreError::Custom(format!("memory persistence poisoned: {e}")))?;
        *guard = items.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Callback invoked after each successful mutation.
pub type StoreObserver = Box<dyn Fn(&Event) + Send>;

/// Result of [`ItemStore::move_category`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// The item after the move.
    pub item: Item,
    /// Reminder whose due time must be dropped to match the cleared
    /// local start time.
    pub clear_reminder_time: Option<String>,
}

/// Ordered, persisted collection of items.
pub struct ItemStore {
    items: Vec<Item>,
    persistence: Box<dyn ItemPersistence>,
    clock: Arc<dyn Clock>,
    observers: Vec<StoreObserver>,
}

impl ItemStore {
    /// Load the collection from `persistence`.
    ///
    /// Unreadable data starts an empty store. Loaded items are repaired:
    /// the completion stamp is made consistent with the status and a link
    /// held by more than one item is kept only on the first holder.
    pub fn open(persistence: Box<dyn ItemPersistence>, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let mut items = match persistence.load_all() {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "could not load items, starting empty");
                Vec::new()
            }
        };

        let mut seen: HashSet<(LinkKind, String)> = HashSet::new();
        for item in &mut items {
            item.normalize_completion(now);
            for kind in [LinkKind::Calendar, LinkKind::Reminder] {
                if let Some(ext) = item.link(kind).map(str::to_string) {
                    if !seen.insert((kind, ext.clone())) {
                        warn!(item = %item.id, %kind, external_id = %ext, "dropping duplicate link");
                        item.set_link(kind, None);
                    }
                }
            }
        }

        Self {
            items,
            persistence,
            clock,
            observers: Vec::new(),
        }
    }

    /// Register an observer for mutation events.
    pub fn subscribe(&mut self, observer: StoreObserver) {
        self.observers.push(observer);
    }

    /// Current wall-clock time from the store's clock.
    pub fn now(&self) -> chrono::NaiveDateTime {
        self.clock.now()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in insertion order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    /// The item holding a given link, if any.
    pub fn find_by_link(&self, kind: LinkKind, external_id: &str) -> Option<&Item> {
        self.items
            .iter()
            .find(|i| i.link(kind) == Some(external_id))
    }

    /// Items passing `filter`, in canonical order.
    pub fn query<F>(&self, filter: F) -> Vec<Item>
    where
        F: Fn(&Item) -> bool,
    {
        let mut out: Vec<Item> = self.items.iter().filter(|i| filter(i)).cloned().collect();
        sort_items(&mut out);
        out
    }

    /// Append an item under a fresh id and return that id.
    ///
    /// # Errors
    /// Returns [`ValidationError::DuplicateLink`] when another item already
    /// holds one of the item's links.
    pub fn add(&mut self, mut item: Item) -> Result<ItemId, ValidationError> {
        item.id = uuid::Uuid::new_v4().to_string();
        self.check_links(&item)?;
        item.normalize_completion(self.clock.now());

        let id = item.id.clone();
        debug!(item = %id, title = %item.title, "item added");
        self.items.push(item.clone());
        self.persist();
        self.notify(&Event::ItemAdded { item });
        Ok(id)
    }

    /// Replace the item with the same id. Returns `false` when no such item
    /// exists (nothing happens).
    ///
    /// The status is taken as given. User-driven status changes belong in
    /// [`ItemStore::set_status`] or the planner, which mirror them to
    /// linked reminders.
    ///
    /// # Errors
    /// Returns [`ValidationError::DuplicateLink`] when another item already
    /// holds one of the item's links.
    pub fn update(&mut self, mut item: Item) -> Result<bool, ValidationError> {
        let Some(index) = self.position(&item.id) else {
            return Ok(false);
        };
        self.check_links(&item)?;
        item.normalize_completion(self.clock.now());

        if self.items[index] == item {
            return Ok(true);
        }
        self.items[index] = item.clone();
        self.persist();
        self.notify(&Event::ItemUpdated { item });
        Ok(true)
    }

    /// Remove an item, returning it.
    pub fn delete(&mut self, id: &str) -> Option<Item> {
        let index = self.position(id)?;
        let removed = self.items.remove(index);
        debug!(item = %removed.id, "item deleted");
        self.persist();
        self.notify(&Event::ItemDeleted {
            id: removed.id.clone(),
        });
        Some(removed)
    }

    /// Advance an item one step through the status cycle and return the new
    /// status. Entering Done stamps the completion time; leaving it clears
    /// the stamp.
    pub fn set_status(&mut self, id: &str) -> Option<Status> {
        let now = self.clock.now();
        let index = self.position(id)?;
        let item = &mut self.items[index];
        let next = item.status.cycled();
        item.apply_status(next, now);
        let snapshot = item.clone();
        self.persist();
        self.notify(&Event::ItemUpdated { item: snapshot });
        Some(next)
    }

    /// Put an item in another category.
    ///
    /// A reminder-linked item that carries a start time loses it, since the
    /// user has overridden the time the reminder implied; the outcome names
    /// the reminder so the caller can drop its due time too.
    pub fn move_category(&mut self, id: &str, category: Category) -> Option<MoveOutcome> {
        let index = self.position(id)?;
        let item = &mut self.items[index];

        let clear_reminder_time = match (&item.start_time, &item.reminder_id) {
            (Some(_), Some(reminder)) => {
                let reminder = reminder.clone();
                item.start_time = None;
                item.deferred_from = None;
                Some(reminder)
            }
            _ => None,
        };
        item.category = Some(category);

        let snapshot = item.clone();
        self.persist();
        self.notify(&Event::ItemUpdated {
            item: snapshot.clone(),
        });
        Some(MoveOutcome {
            item: snapshot,
            clear_reminder_time,
        })
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }

    fn check_links(&self, item: &Item) -> Result<(), ValidationError> {
        for kind in [LinkKind::Calendar, LinkKind::Reminder] {
            let Some(ext) = item.link(kind) else { continue };
            if let Some(holder) = self
                .items
                .iter()
                .find(|other| other.id != item.id && other.link(kind) == Some(ext))
            {
                return Err(ValidationError::DuplicateLink {
                    kind,
                    external_id: ext.to_string(),
                    holder: holder.id.clone(),
                });
            }
        }
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.persistence.save_all(&self.items) {
            warn!(error = %e, count = self.items.len(), "failed to save items");
        }
    }

    fn notify(&self, event: &Event) {
        for observer in &self.observers {
            observer(event);
        }
    }
}
