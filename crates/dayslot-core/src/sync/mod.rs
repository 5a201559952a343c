//! External calendar and reminder sources.
//!
//! The native stores are out of process; the core only sees them through
//! [`ExternalSource`]. Two implementations ship with the crate:
//! [`InMemorySource`] for tests and embedding, and [`JsonFileSource`] which
//! backs the CLI.

pub mod file_source;
pub mod memory;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, TimeMathError};
use crate::item::{Item, LinkKind};
use crate::window::time_math::at_time;
use crate::window::{DayWindow, TimeOfDay};

pub use file_source::JsonFileSource;
pub use memory::{InMemorySource, SourceCall};

/// The defining instant of an external entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// Event start or timed reminder due.
    At(NaiveDateTime),
    /// Reminder due on a date with no time component.
    Date(NaiveDate),
}

impl Anchor {
    /// Wall-clock instant used for classification and windowing.
    ///
    /// Date-only anchors resolve to the rollover boundary of their date, so
    /// they open that day's window.
    pub fn instant(&self, boundary: TimeOfDay) -> Result<NaiveDateTime, TimeMathError> {
        match *self {
            Anchor::At(at) => Ok(at),
            Anchor::Date(date) => at_time(date, boundary),
        }
    }

    pub fn date(&self) -> NaiveDate {
        match *self {
            Anchor::At(at) => at.date(),
            Anchor::Date(date) => date,
        }
    }

    /// The same day without a time of day.
    pub fn without_time(&self) -> Anchor {
        Anchor::Date(self.date())
    }

    /// Whether the anchor may fall inside `range`.
    ///
    /// Date-only anchors are matched by calendar day since their instant
    /// depends on the configured boundary.
    pub fn overlaps(&self, range: &DayWindow) -> bool {
        match *self {
            Anchor::At(at) => range.contains(at),
            Anchor::Date(date) => range.start.date() <= date && date <= range.end.date(),
        }
    }
}

/// One calendar event or reminder as the source reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalEntity {
    pub external_id: String,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Missing when the source has no usable date for the entity.
    #[serde(default)]
    pub anchor: Option<Anchor>,
    /// Completion flag. Calendars have none.
    #[serde(default)]
    pub is_done: Option<bool>,
}

impl ExternalEntity {
    pub fn new(external_id: impl Into<String>, title: impl Into<String>, anchor: Option<Anchor>) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            notes: None,
            anchor,
            is_done: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_done(mut self, done: bool) -> Self {
        self.is_done = Some(done);
        self
    }
}

/// Item-derived payload for write-back calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBack {
    pub title: String,
    pub notes: Option<String>,
    pub anchor: Option<Anchor>,
    pub is_done: bool,
}

impl WriteBack {
    pub fn from_item(item: &Item) -> Self {
        Self {
            title: item.title.clone(),
            notes: item.memo.clone(),
            anchor: item.start_time.map(Anchor::At),
            is_done: item.is_done(),
        }
    }

    pub fn with_anchor(mut self, anchor: Option<Anchor>) -> Self {
        self.anchor = anchor;
        self
    }
}

/// A calendar or reminders store outside the process.
///
/// Every call may suspend. Timeouts and retries are the implementation's
/// business; callers treat any error as "no answer this time".
#[async_trait]
pub trait ExternalSource: Send + Sync {
    /// Which item link this source fills.
    fn kind(&self) -> LinkKind;

    /// Human-readable source name for logs and prompts.
    fn name(&self) -> &str;

    /// Entities that may overlap `range`. Sources may return more.
    async fn fetch_entities(&self, range: DayWindow) -> Result<Vec<ExternalEntity>, ProviderError>;

    /// Look an entity up directly. `Ok(None)` means it no longer exists.
    async fn fetch_by_id(&self, external_id: &str) -> Result<Option<ExternalEntity>, ProviderError>;

    /// Create an entity and return its id.
    async fn create(&self, payload: &WriteBack) -> Result<String, ProviderError>;

    async fn update(&self, external_id: &str, payload: &WriteBack) -> Result<(), ProviderError>;

    async fn set_done(&self, external_id: &str) -> Result<(), ProviderError>;

    async fn set_not_done(&self, external_id: &str) -> Result<(), ProviderError>;

    /// Keep the entity's date but drop its time of day.
    async fn clear_anchor_time(&self, external_id: &str) -> Result<(), ProviderError>;

    async fn delete(&self, external_id: &str) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, day).unwrap()
    }

    #[test]
    fn date_anchor_resolves_to_boundary() {
        let boundary = TimeOfDay::new(6, 0).unwrap();
        let anchor = Anchor::Date(date(17));
        assert_eq!(
            anchor.instant(boundary).unwrap(),
            date(17).and_hms_opt(6, 0, 0).unwrap()
        );
    }

    #[test]
    fn without_time_keeps_the_day() {
        let anchor = Anchor::At(date(17).and_hms_opt(19, 30, 0).unwrap());
        assert_eq!(anchor.without_time(), Anchor::Date(date(17)));
    }

    #[test]
    fn overlap_by_instant_and_by_day() {
        let range = DayWindow {
            start: date(15).and_hms_opt(6, 0, 0).unwrap(),
            end: date(20).and_hms_opt(6, 0, 0).unwrap(),
        };
        assert!(Anchor::At(date(15).and_hms_opt(6, 0, 0).unwrap()).overlaps(&range));
        assert!(!Anchor::At(date(15).and_hms_opt(5, 59, 0).unwrap()).overlaps(&range));
        assert!(Anchor::Date(date(15)).overlaps(&range));
        assert!(Anchor::Date(date(20)).overlaps(&range));
        assert!(!Anchor::Date(date(21)).overlaps(&range));
    }

    #[test]
    fn entity_json_shape() {
        let entity = ExternalEntity::new("rem-1", "pills", Some(Anchor::Date(date(17)))).with_done(true);
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["anchor"]["date"], "2025-11-17");
        assert_eq!(json["is_done"], true);

        let parsed: ExternalEntity =
            serde_json::from_str(r#"{"external_id":"e","title":"t"}"#).unwrap();
        assert!(parsed.anchor.is_none());
        assert!(parsed.is_done.is_none());
    }
}
