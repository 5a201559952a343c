//! The day planner: one owner for the store, the sources and the rollover
//! engine.
//!
//! `refresh` is the foreground entry point. It rolls the day over, then
//! reconciles calendar and reminders, fetching from both at once. User
//! actions go through the planner so linked reminders hear about them.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{CoreError, ProviderError, Result, ValidationError};
use crate::events::Event;
use crate::item::query::{items_for_category, today_items, uncategorized};
use crate::item::{Category, Item, ItemId, ItemStore, Kind, LinkKind, Status};
use crate::reconcile::{PendingPass, ReconcileStatus, ReconcileSummary, Reconciler, ResolvedPass};
use crate::rollover::{DayRolloverEngine, RolloverSummary};
use crate::storage::database::{prompt_key, LAST_ROLLOVER_KEY};
use crate::storage::{Config, Database};
use crate::sync::{Anchor, ExternalEntity, ExternalSource, WriteBack};
use crate::widget::WidgetSnapshot;
use crate::window::DayWindow;

/// Direction for [`DayPlanner::move_to_adjacent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Next,
    Previous,
}

/// What one refresh did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    pub window: Option<DayWindow>,
    pub rollover: RolloverSummary,
    pub calendar: ReconcileSummary,
    pub reminders: ReconcileSummary,
}

impl RefreshReport {
    pub fn mutations(&self) -> usize {
        self.rollover.mutations() + self.calendar.mutations() + self.reminders.mutations()
    }

    /// One line per stage.
    pub fn lines(&self) -> Vec<String> {
        vec![
            self.rollover.message(),
            self.calendar.message(),
            self.reminders.message(),
        ]
    }
}

/// Owns the item store and everything that mutates it.
pub struct DayPlanner {
    store: ItemStore,
    config: Config,
    db: Database,
    calendar: Box<dyn ExternalSource>,
    reminders: Box<dyn ExternalSource>,
    rollover: DayRolloverEngine,
    prompts: Vec<LinkKind>,
}

impl DayPlanner {
    /// Open the store from `db` and restore the rollover state.
    pub fn new(
        db: Database,
        config: Config,
        clock: Arc<dyn Clock>,
        calendar: Box<dyn ExternalSource>,
        reminders: Box<dyn ExternalSource>,
    ) -> Self {
        let store = ItemStore::open(Box::new(db.clone()), clock);
        let last = db.kv_get_timestamp(LAST_ROLLOVER_KEY).unwrap_or_else(|e| {
            warn!(error = %e, "cannot read rollover state");
            None
        });
        Self {
            store,
            config,
            db,
            calendar,
            reminders,
            rollover: DayRolloverEngine::resume(last),
            prompts: Vec::new(),
        }
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub fn now(&self) -> NaiveDateTime {
        self.store.now()
    }

    pub fn subscribe(&mut self, observer: Box<dyn Fn(&Event) + Send>) {
        self.store.subscribe(observer);
    }

    /// The active day window for "now".
    pub fn active_window(&self) -> Result<DayWindow> {
        Ok(self.rollover.active_window(self.now(), &self.config.windows)?)
    }

    pub fn current_category(&self) -> Category {
        self.config.windows.current_category(self.now())
    }

    pub fn today_items(&self) -> Result<Vec<Item>> {
        Ok(today_items(&self.store, &self.active_window()?))
    }

    pub fn items_for_category(&self, category: Category, kind: Option<Kind>) -> Result<Vec<Item>> {
        Ok(items_for_category(&self.store, category, kind, &self.active_window()?))
    }

    pub fn uncategorized(&self, kind: Option<Kind>) -> Vec<Item> {
        uncategorized(&self.store, kind)
    }

    pub fn widget_snapshot(&self) -> Result<WidgetSnapshot> {
        Ok(WidgetSnapshot::build(
            &self.store,
            &self.config.windows,
            self.now(),
            self.config.widget.limit,
        )?)
    }

    /// Sources whose access was refused for the first time since the
    /// flag was last cleared. Each is returned once.
    pub fn take_permission_prompts(&mut self) -> Vec<LinkKind> {
        std::mem::take(&mut self.prompts)
    }

    /// Roll over, then reconcile both sources.
    pub async fn refresh(&mut self) -> RefreshReport {
        let now = self.now();
        let rollover = self.rollover.rollover(&mut self.store, now, &self.config.windows);
        if rollover.ran {
            if let Some(start) = self.rollover.last_window_start() {
                if let Err(e) = self.db.kv_set_timestamp(LAST_ROLLOVER_KEY, start) {
                    warn!(error = %e, "cannot store rollover state");
                }
            }
        }

        let window = match rollover.window {
            Some(window) => window,
            None => {
                let failed = |kind| {
                    ReconcileSummary::new(
                        kind,
                        ReconcileStatus::Failed {
                            message: "no active window".into(),
                        },
                    )
                };
                return RefreshReport {
                    window: None,
                    rollover,
                    calendar: failed(LinkKind::Calendar),
                    reminders: failed(LinkKind::Reminder),
                };
            }
        };

        let margin = self.config.sync.fetch_margin_days;
        let calendar_pass = Reconciler::new(self.calendar.kind(), margin);
        let reminders_pass = Reconciler::new(self.reminders.kind(), margin);
        let calendar_on = self.config.sync.calendar_enabled;
        let reminders_on = self.config.sync.reminders_enabled;

        let (calendar_fetch, reminders_fetch) = tokio::join!(
            fetch_if(calendar_on, &calendar_pass, self.calendar.as_ref(), window),
            fetch_if(reminders_on, &reminders_pass, self.reminders.as_ref(), window),
        );

        let windows = self.config.windows;
        let calendar_pending =
            calendar_fetch.map(|f| calendar_pass.apply(&mut self.store, window, &windows, f));
        let reminders_pending =
            reminders_fetch.map(|f| reminders_pass.apply(&mut self.store, window, &windows, f));

        let (calendar_resolved, reminders_resolved) = tokio::join!(
            resolve_if(&calendar_pass, self.calendar.as_ref(), calendar_pending),
            resolve_if(&reminders_pass, self.reminders.as_ref(), reminders_pending),
        );

        let calendar = match calendar_resolved {
            Some(resolved) => calendar_pass.finish(&mut self.store, &windows, resolved),
            None => ReconcileSummary::new(calendar_pass.kind(), ReconcileStatus::Disabled),
        };
        let reminders = match reminders_resolved {
            Some(resolved) => reminders_pass.finish(&mut self.store, &windows, resolved),
            None => ReconcileSummary::new(reminders_pass.kind(), ReconcileStatus::Disabled),
        };

        for summary in [&calendar, &reminders] {
            if summary.is_permission_denied() {
                self.raise_prompt(summary.source);
            }
        }

        let report = RefreshReport {
            window: Some(window),
            rollover,
            calendar,
            reminders,
        };
        info!(mutations = report.mutations(), "refresh finished");
        report
    }

    fn raise_prompt(&mut self, kind: LinkKind) {
        let key = prompt_key(kind.as_str());
        match self.db.kv_flag(&key) {
            Ok(true) => {}
            Ok(false) => {
                if let Err(e) = self.db.kv_set(&key, "true") {
                    warn!(error = %e, "cannot store prompt flag");
                }
                self.prompts.push(kind);
            }
            Err(e) => warn!(error = %e, "cannot read prompt flag"),
        }
    }

    /// Forget that the access prompt was shown, so the next refusal
    /// raises it again.
    pub fn reset_permission_prompt(&self, kind: LinkKind) -> Result<()> {
        self.db.kv_delete(&prompt_key(kind.as_str()))
    }

    fn reminders_on(&self) -> bool {
        self.config.sync.reminders_enabled
    }

    /// Add an item. With `sync_to_reminders`, also create a reminder due
    /// at the end of the item's category (today, date only, when it has
    /// none) and link it.
    pub async fn add_item(&mut self, draft: Item, sync_to_reminders: bool) -> Result<ItemId> {
        let id = self.store.add(draft)?;
        if !(sync_to_reminders && self.reminders_on()) {
            return Ok(id);
        }

        let Some(item) = self.store.get(&id).cloned() else {
            return Ok(id);
        };
        let anchor = self.reminder_due(item.category)?;
        let payload = WriteBack::from_item(&item).with_anchor(Some(anchor));
        match self.reminders.create(&payload).await {
            Ok(external_id) => {
                let mut linked = item;
                linked.reminder_id = Some(external_id);
                self.store.update(linked)?;
            }
            Err(e) => warn!(item = %id, error = %e, "reminder not created"),
        }
        Ok(id)
    }

    fn reminder_due(&self, category: Option<Category>) -> Result<Anchor> {
        let window = self.active_window()?;
        Ok(match category {
            Some(category) => {
                let span = window.category_span(self.config.windows.range(category))?;
                Anchor::At(span.end)
            }
            None => Anchor::Date(window.start.date()),
        })
    }

    /// Cycle an item's status and mirror Done to its reminder.
    pub async fn set_status(&mut self, id: &str) -> Result<Status> {
        let was_done = self.get(id)?.is_done();
        let status = self
            .store
            .set_status(id)
            .ok_or_else(|| ValidationError::ItemNotFound(id.to_string()))?;

        if let Some(reminder) = self.linked_reminder(id) {
            let result = match (was_done, status == Status::Done) {
                (false, true) => Some(self.reminders.set_done(&reminder).await),
                (true, false) => Some(self.reminders.set_not_done(&reminder).await),
                _ => None,
            };
            if let Some(Err(e)) = result {
                warn!(item = %id, %reminder, error = %e, "reminder status not updated");
            }
        }
        Ok(status)
    }

    /// Move an item to another category. A reminder-anchored item loses its
    /// time here and on the reminder.
    pub async fn move_category(&mut self, id: &str, category: Category) -> Result<Item> {
        let outcome = self
            .store
            .move_category(id, category)
            .ok_or_else(|| ValidationError::ItemNotFound(id.to_string()))?;

        if let Some(reminder) = outcome.clear_reminder_time {
            if self.reminders_on() {
                if let Err(e) = self.reminders.clear_anchor_time(&reminder).await {
                    warn!(item = %id, %reminder, error = %e, "reminder time not cleared");
                }
            }
        }
        Ok(outcome.item)
    }

    /// Move an item one category forward or back. `None` at either end or
    /// for uncategorized items.
    pub async fn move_to_adjacent(&mut self, id: &str, direction: Direction) -> Result<Option<Item>> {
        let Some(current) = self.get(id)?.category else {
            return Ok(None);
        };
        let target = match direction {
            Direction::Next => current.next(),
            Direction::Previous => current.previous(),
        };
        match target {
            Some(category) => Ok(Some(self.move_category(id, category).await?)),
            None => {
                debug!(item = %id, %current, ?direction, "no adjacent category");
                Ok(None)
            }
        }
    }

    /// Delete an item and its reminder.
    pub async fn delete_item(&mut self, id: &str) -> Result<Item> {
        let removed = self
            .store
            .delete(id)
            .ok_or_else(|| ValidationError::ItemNotFound(id.to_string()))?;

        if let (Some(reminder), true) = (&removed.reminder_id, self.reminders_on()) {
            match self.reminders.delete(reminder).await {
                Ok(()) | Err(ProviderError::NotFound { .. }) => {}
                Err(e) => warn!(item = %id, %reminder, error = %e, "reminder not deleted"),
            }
        }
        Ok(removed)
    }

    /// Replace an item and push its title and memo to its reminder.
    ///
    /// The stored status and completion time are kept; status changes go
    /// through [`DayPlanner::set_status`] so linked reminders mirror them.
    pub async fn update_item(&mut self, mut item: Item) -> Result<()> {
        let id = item.id.clone();
        let current = self.get(&id)?;
        item.status = current.status;
        item.completed_at = current.completed_at;
        if !self.store.update(item)? {
            return Err(ValidationError::ItemNotFound(id).into());
        }
        if let Some(reminder) = self.linked_reminder(&id) {
            let payload = WriteBack::from_item(self.get(&id)?);
            if let Err(e) = self.reminders.update(&reminder, &payload).await {
                warn!(item = %id, %reminder, error = %e, "reminder not updated");
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&Item> {
        self.store
            .get(id)
            .ok_or_else(|| CoreError::Validation(ValidationError::ItemNotFound(id.to_string())))
    }

    fn linked_reminder(&self, id: &str) -> Option<String> {
        if !self.reminders_on() {
            return None;
        }
        self.store.get(id)?.reminder_id.clone()
    }
}

async fn fetch_if(
    enabled: bool,
    reconciler: &Reconciler,
    source: &dyn ExternalSource,
    window: DayWindow,
) -> Option<std::result::Result<Vec<ExternalEntity>, ReconcileStatus>> {
    if !enabled {
        return None;
    }
    Some(reconciler.fetch(source, window).await)
}

async fn resolve_if(
    reconciler: &Reconciler,
    source: &dyn ExternalSource,
    pending: Option<PendingPass>,
) -> Option<ResolvedPass> {
    match pending {
        Some(pending) => Some(reconciler.resolve(source, pending).await),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::sync::{InMemorySource, SourceCall};
    use chrono::NaiveDate;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    struct Fixture {
        planner: DayPlanner,
        clock: FixedClock,
        calendar: InMemorySource,
        reminders: InMemorySource,
        db: Database,
    }

    fn fixture(now: NaiveDateTime) -> Fixture {
        let db = Database::open_memory().unwrap();
        let clock = FixedClock::new(now);
        let calendar = InMemorySource::calendar();
        let reminders = InMemorySource::reminders();
        let planner = DayPlanner::new(
            db.clone(),
            Config::default(),
            Arc::new(clock.clone()),
            Box::new(calendar.clone()),
            Box::new(reminders.clone()),
        );
        Fixture {
            planner,
            clock,
            calendar,
            reminders,
            db,
        }
    }

    #[tokio::test]
    async fn refresh_runs_rollover_then_both_sources() {
        let mut f = fixture(at(17, 7, 0));
        f.calendar
            .insert(ExternalEntity::new("evt", "standup", Some(Anchor::At(at(17, 9, 30)))));
        f.reminders.insert(
            ExternalEntity::new("rem", "pills", Some(Anchor::At(at(17, 21, 0)))).with_done(false),
        );

        let report = f.planner.refresh().await;
        assert!(report.rollover.ran);
        assert_eq!(report.calendar.added, 1);
        assert_eq!(report.reminders.added, 1);
        assert_eq!(f.planner.today_items().unwrap().len(), 2);
        assert_eq!(
            f.db.kv_get_timestamp(LAST_ROLLOVER_KEY).unwrap(),
            Some(at(17, 6, 0))
        );
        assert_eq!(report.lines().len(), 3);
    }

    #[tokio::test]
    async fn disabled_source_is_not_called() {
        let mut f = fixture(at(17, 7, 0));
        let mut config = Config::default();
        config.sync.calendar_enabled = false;
        f.planner.set_config(config);

        let report = f.planner.refresh().await;
        assert_eq!(report.calendar.status, ReconcileStatus::Disabled);
        assert!(f.calendar.calls().is_empty());
        assert_eq!(report.reminders.status, ReconcileStatus::Completed);
    }

    #[tokio::test]
    async fn permission_prompt_is_raised_once() {
        let mut f = fixture(at(17, 7, 0));
        f.reminders.deny_permission(true);

        f.planner.refresh().await;
        assert_eq!(f.planner.take_permission_prompts(), vec![LinkKind::Reminder]);
        assert!(f.planner.take_permission_prompts().is_empty());

        f.clock.advance(chrono::Duration::hours(1));
        f.planner.refresh().await;
        assert!(f.planner.take_permission_prompts().is_empty());

        f.planner.reset_permission_prompt(LinkKind::Reminder).unwrap();
        f.planner.refresh().await;
        assert_eq!(f.planner.take_permission_prompts(), vec![LinkKind::Reminder]);
    }

    #[tokio::test]
    async fn add_item_creates_reminder_at_category_end() {
        let mut f = fixture(at(17, 7, 0));
        let draft = Item::new("bins out", Kind::MustDo, at(17, 7, 0)).with_category(Some(Category::Night));
        let id = f.planner.add_item(draft, true).await.unwrap();

        let item = f.planner.get(&id).unwrap().clone();
        let reminder = item.reminder_id.clone().unwrap();
        assert!(item.start_time.is_none());
        let entity = f.reminders.get(&reminder).unwrap();
        assert_eq!(entity.anchor, Some(Anchor::At(at(18, 6, 0))));
        assert_eq!(entity.title, "bins out");

        let loose = Item::new("someday", Kind::WantTo, at(17, 7, 0));
        let id = f.planner.add_item(loose, true).await.unwrap();
        let reminder = f.planner.get(&id).unwrap().reminder_id.clone().unwrap();
        assert_eq!(
            f.reminders.get(&reminder).unwrap().anchor,
            Some(Anchor::Date(at(17, 0, 0).date()))
        );

        // the app-created link survives a refresh untouched
        let report = f.planner.refresh().await;
        assert_eq!(report.reminders.mutations(), 0);
    }

    #[tokio::test]
    async fn add_item_keeps_local_item_when_reminder_fails() {
        let mut f = fixture(at(17, 7, 0));
        f.reminders.set_unavailable(true);
        let id = f
            .planner
            .add_item(Item::new("offline", Kind::MustDo, at(17, 7, 0)), true)
            .await
            .unwrap();
        assert!(f.planner.get(&id).unwrap().reminder_id.is_none());
    }

    #[tokio::test]
    async fn set_status_mirrors_done_to_reminder() {
        let mut f = fixture(at(17, 7, 0));
        let id = f
            .planner
            .add_item(Item::new("pills", Kind::MustDo, at(17, 7, 0)), true)
            .await
            .unwrap();
        let reminder = f.planner.get(&id).unwrap().reminder_id.clone().unwrap();
        f.reminders.clear_calls();

        assert_eq!(f.planner.set_status(&id).await.unwrap(), Status::InProgress);
        assert!(f.reminders.write_calls().is_empty());
        assert_eq!(f.planner.set_status(&id).await.unwrap(), Status::Done);
        assert_eq!(f.reminders.get(&reminder).unwrap().is_done, Some(true));
        assert_eq!(f.planner.set_status(&id).await.unwrap(), Status::NotStarted);
        assert_eq!(f.reminders.get(&reminder).unwrap().is_done, Some(false));

        assert!(f.planner.set_status("missing").await.is_err());
    }

    #[tokio::test]
    async fn move_clears_reminder_time_on_both_sides() {
        let mut f = fixture(at(17, 7, 0));
        f.reminders.insert(
            ExternalEntity::new("rem", "pills", Some(Anchor::At(at(17, 19, 0)))).with_done(false),
        );
        f.planner.refresh().await;
        let id = f.planner.store().items()[0].id.clone();
        assert_eq!(f.planner.get(&id).unwrap().category, Some(Category::Evening));

        let moved = f.planner.move_category(&id, Category::Night).await.unwrap();
        assert!(moved.start_time.is_none());
        assert!(f
            .reminders
            .calls()
            .contains(&SourceCall::ClearAnchorTime("rem".into())));
        assert_eq!(
            f.reminders.get("rem").unwrap().anchor,
            Some(Anchor::Date(at(17, 0, 0).date()))
        );

        // the item is now unanchored and keeps its category across refreshes
        f.planner.refresh().await;
        assert_eq!(f.planner.get(&id).unwrap().category, Some(Category::Night));
    }

    #[tokio::test]
    async fn adjacent_moves_are_bounded() {
        let mut f = fixture(at(17, 7, 0));
        let id = f
            .planner
            .add_item(
                Item::new("x", Kind::MustDo, at(17, 7, 0)).with_category(Some(Category::Evening)),
                false,
            )
            .await
            .unwrap();

        let moved = f.planner.move_to_adjacent(&id, Direction::Next).await.unwrap();
        assert_eq!(moved.unwrap().category, Some(Category::Night));
        assert!(f.planner.move_to_adjacent(&id, Direction::Next).await.unwrap().is_none());
        let back = f.planner.move_to_adjacent(&id, Direction::Previous).await.unwrap();
        assert_eq!(back.unwrap().category, Some(Category::Evening));
    }

    #[tokio::test]
    async fn delete_and_update_write_back() {
        let mut f = fixture(at(17, 7, 0));
        let id = f
            .planner
            .add_item(Item::new("draft", Kind::MustDo, at(17, 7, 0)), true)
            .await
            .unwrap();
        let reminder = f.planner.get(&id).unwrap().reminder_id.clone().unwrap();

        let mut edited = f.planner.get(&id).unwrap().clone();
        edited.title = "final".into();
        edited.memo = Some("with notes".into());
        f.planner.update_item(edited).await.unwrap();
        let entity = f.reminders.get(&reminder).unwrap();
        assert_eq!(entity.title, "final");
        assert_eq!(entity.notes.as_deref(), Some("with notes"));

        f.planner.delete_item(&id).await.unwrap();
        assert!(f.reminders.get(&reminder).is_none());
        assert!(f.planner.delete_item(&id).await.is_err());
    }

    #[tokio::test]
    async fn update_keeps_stored_status() {
        let mut f = fixture(at(17, 7, 0));
        let id = f
            .planner
            .add_item(Item::new("laundry", Kind::WantTo, at(17, 7, 0)), true)
            .await
            .unwrap();
        let reminder = f.planner.get(&id).unwrap().reminder_id.clone().unwrap();

        let mut edited = f.planner.get(&id).unwrap().clone();
        edited.title = "laundry and towels".into();
        edited.status = Status::Done;
        edited.completed_at = Some(at(17, 7, 0));
        f.planner.update_item(edited).await.unwrap();

        let item = f.planner.get(&id).unwrap();
        assert_eq!(item.title, "laundry and towels");
        assert_eq!(item.status, Status::NotStarted);
        assert!(item.completed_at.is_none());
        assert_eq!(f.reminders.get(&reminder).unwrap().is_done, Some(false));
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let f = fixture(at(17, 7, 0));
        let mut planner = f.planner;
        planner
            .add_item(Item::new("kept", Kind::MustDo, at(17, 7, 0)), false)
            .await
            .unwrap();
        planner.refresh().await;
        drop(planner);

        let mut reopened = DayPlanner::new(
            f.db.clone(),
            Config::default(),
            Arc::new(f.clock.clone()),
            Box::new(f.calendar.clone()),
            Box::new(f.reminders.clone()),
        );
        assert_eq!(reopened.store().len(), 1);
        assert!(!reopened.refresh().await.rollover.ran);
    }
}
