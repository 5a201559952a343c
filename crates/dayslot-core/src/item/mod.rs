//! Todo items and their in-memory store.
//!
//! An [`Item`] lives in one of the four daily categories (or none), carries
//! a tri-state [`Status`], and may be linked to a calendar event and/or a
//! reminder in the external sources.

pub mod ordering;
pub mod query;
pub mod store;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
pub use crate::window::Category;

pub use ordering::compare_items;
pub use store::{ItemPersistence, ItemStore, MemoryPersistence, MoveOutcome};

/// Opaque, immutable item identifier.
pub type ItemId = String;

/// Whether an item must be done today or is optional.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    #[default]
    MustDo,
    WantTo,
}

impl Kind {
    /// Sort rank: must-do first.
    pub fn rank(self) -> u8 {
        match self {
            Kind::MustDo => 0,
            Kind::WantTo => 1,
        }
    }
}

impl FromStr for Kind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "must_do" | "must" => Ok(Kind::MustDo),
            "want_to" | "want" => Ok(Kind::WantTo),
            other => Err(ValidationError::InvalidValue {
                field: "kind".into(),
                message: format!("unknown kind '{other}'"),
            }),
        }
    }
}

/// Item progress.
///
/// User toggles walk the cycle NotStarted → InProgress → Done → NotStarted:
///
///   NOT_STARTED ──> IN_PROGRESS ──> DONE
///        ^                            |
///        +----------------------------+
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    NotStarted,
    InProgress,
    Done,
}

impl Status {
    /// The next state in the toggle cycle.
    pub fn cycled(self) -> Status {
        match self {
            Status::NotStarted => Status::InProgress,
            Status::InProgress => Status::Done,
            Status::Done => Status::NotStarted,
        }
    }

    /// Sort rank: in-progress first, done last.
    pub fn rank(self) -> u8 {
        match self {
            Status::InProgress => 0,
            Status::NotStarted => 1,
            Status::Done => 2,
        }
    }
}

/// Which external source a link points into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Calendar event.
    Calendar,
    /// Reminders list entry.
    Reminder,
}

impl LinkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkKind::Calendar => "calendar",
            LinkKind::Reminder => "reminder",
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A todo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier, assigned by the store on `add`
    pub id: ItemId,
    pub title: String,
    pub memo: Option<String>,
    pub kind: Kind,
    /// Daily bucket, `None` for the unplanned backlog
    pub category: Option<Category>,
    pub status: Status,
    /// External anchor (event start / reminder due). Locally created items
    /// have none.
    #[serde(default)]
    pub start_time: Option<NaiveDateTime>,
    /// Set exactly while `status == Done`
    #[serde(default)]
    pub completed_at: Option<NaiveDateTime>,
    /// Calendar event link
    #[serde(default)]
    pub calendar_event_id: Option<String>,
    /// Reminder link
    #[serde(default)]
    pub reminder_id: Option<String>,
    pub created_at: NaiveDateTime,
    /// External anchor the item had when rollover deferred it
    #[serde(default)]
    pub deferred_from: Option<NaiveDateTime>,
}

impl Item {
    /// A new not-started item. The id is a placeholder until the store adds it.
    pub fn new(title: impl Into<String>, kind: Kind, created_at: NaiveDateTime) -> Self {
        Item {
            id: String::new(),
            title: title.into(),
            memo: None,
            kind,
            category: None,
            status: Status::NotStarted,
            start_time: None,
            completed_at: None,
            calendar_event_id: None,
            reminder_id: None,
            created_at,
            deferred_from: None,
        }
    }

    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }

    pub fn with_memo(mut self, memo: Option<String>) -> Self {
        self.memo = memo;
        self
    }

    pub fn link(&self, kind: LinkKind) -> Option<&str> {
        match kind {
            LinkKind::Calendar => self.calendar_event_id.as_deref(),
            LinkKind::Reminder => self.reminder_id.as_deref(),
        }
    }

    pub fn set_link(&mut self, kind: LinkKind, external_id: Option<String>) {
        match kind {
            LinkKind::Calendar => self.calendar_event_id = external_id,
            LinkKind::Reminder => self.reminder_id = external_id,
        }
    }

    /// Whether any external link is set.
    pub fn is_linked(&self) -> bool {
        self.calendar_event_id.is_some() || self.reminder_id.is_some()
    }

    /// Whether the item carries an external time anchor.
    pub fn is_anchored(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn is_done(&self) -> bool {
        self.status == Status::Done
    }

    /// Set the status and keep `completed_at` consistent with it.
    pub(crate) fn apply_status(&mut self, status: Status, now: NaiveDateTime) {
        match (self.status == Status::Done, status == Status::Done) {
            (false, true) => self.completed_at = Some(now),
            (_, false) => self.completed_at = None,
            (true, true) => {}
        }
        self.status = status;
    }

    /// Restore the completion invariant on data from outside the store.
    pub(crate) fn normalize_completion(&mut self, fallback: NaiveDateTime) {
        if self.status == Status::Done {
            self.completed_at.get_or_insert(fallback);
        } else {
            self.completed_at = None;
        }
    }
}
