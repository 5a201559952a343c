//! # Dayslot Core Library
//!
//! This library provides the core logic for dayslot, a personal task
//! manager that buckets todos into four daily time windows. All operations
//! are available through the standalone CLI binary; any richer front end is
//! a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Windows**: pure classification of a timestamp into Morning, Daytime,
//!   Evening or Night, plus the rollover-relative day window
//! - **Items**: the owned, persisted item store with its canonical order
//! - **Reconcile**: per-source add/update/delete passes against calendar
//!   and reminders snapshots
//! - **Rollover**: purge of finished items and deferral of open ones at the
//!   configured day boundary
//! - **Storage**: SQLite key-value state and TOML configuration
//!
//! ## Key Components
//!
//! - [`DayPlanner`]: refresh entry point and user actions with write-back
//! - [`ItemStore`]: item collection and mutation API
//! - [`Reconciler`]: one reconcile pass for one source
//! - [`DayRolloverEngine`]: active window and rollover pass
//! - [`ExternalSource`]: trait for calendar/reminder providers

pub mod clock;
pub mod error;
pub mod events;
pub mod item;
pub mod planner;
pub mod reconcile;
pub mod rollover;
pub mod storage;
pub mod sync;
pub mod widget;
pub mod window;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, ProviderError, TimeMathError, ValidationError};
pub use events::Event;
pub use item::{Item, ItemId, ItemStore, Kind, LinkKind, Status};
pub use planner::{DayPlanner, Direction, RefreshReport};
pub use reconcile::{ReconcileStatus, ReconcileSummary, Reconciler};
pub use rollover::{DayRolloverEngine, RolloverSummary};
pub use storage::{Config, Database};
pub use sync::{Anchor, ExternalEntity, ExternalSource, InMemorySource, JsonFileSource, WriteBack};
pub use widget::WidgetSnapshot;
pub use window::{classify, active_window, Category, CategoryRange, DayWindow, TimeOfDay, TimeWindowConfig};
