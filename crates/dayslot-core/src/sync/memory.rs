//! In-process source with switchable failure modes.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{ExternalEntity, ExternalSource, WriteBack};
use crate::error::ProviderError;
use crate::item::LinkKind;
use crate::window::DayWindow;

/// A call the source received, recorded in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    FetchEntities(DayWindow),
    FetchById(String),
    /// Carries the payload title; the id is not known yet.
    Create(String),
    Update(String),
    SetDone(String),
    SetNotDone(String),
    ClearAnchorTime(String),
    Delete(String),
}

impl SourceCall {
    /// Whether the call writes to the source.
    pub fn is_write(&self) -> bool {
        !matches!(self, SourceCall::FetchEntities(_) | SourceCall::FetchById(_))
    }
}

#[derive(Debug, Default)]
struct State {
    entities: BTreeMap<String, ExternalEntity>,
    permission_denied: bool,
    unavailable: bool,
    calls: Vec<SourceCall>,
    next_id: u64,
}

/// Source held entirely in memory. Clones share state, so a test can keep
/// a handle while the planner owns another.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    kind: LinkKind,
    name: String,
    state: Arc<Mutex<State>>,
}

impl InMemorySource {
    pub fn new(kind: LinkKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn calendar() -> Self {
        Self::new(LinkKind::Calendar, "calendar")
    }

    pub fn reminders() -> Self {
        Self::new(LinkKind::Reminder, "reminders")
    }

    /// Insert or replace an entity.
    pub fn insert(&self, entity: ExternalEntity) {
        self.with(|s| {
            s.entities.insert(entity.external_id.clone(), entity);
        });
    }

    pub fn remove(&self, external_id: &str) -> Option<ExternalEntity> {
        self.with(|s| s.entities.remove(external_id))
    }

    pub fn get(&self, external_id: &str) -> Option<ExternalEntity> {
        self.with(|s| s.entities.get(external_id).cloned())
    }

    pub fn entities(&self) -> Vec<ExternalEntity> {
        self.with(|s| s.entities.values().cloned().collect())
    }

    /// Change an entity in place. Returns false when it does not exist.
    pub fn modify<F>(&self, external_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut ExternalEntity),
    {
        self.with(|s| match s.entities.get_mut(external_id) {
            Some(entity) => {
                f(entity);
                true
            }
            None => false,
        })
    }

    /// Answer every call with a permission error.
    pub fn deny_permission(&self, denied: bool) {
        self.with(|s| s.permission_denied = denied);
    }

    /// Answer every call with an unavailable error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.with(|s| s.unavailable = unavailable);
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.with(|s| s.calls.clone())
    }

    /// Recorded calls that wrote to the source.
    pub fn write_calls(&self) -> Vec<SourceCall> {
        self.with(|s| s.calls.iter().filter(|c| c.is_write()).cloned().collect())
    }

    pub fn clear_calls(&self) {
        self.with(|s| s.calls.clear());
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Record the call, then fail if a failure mode is switched on.
    fn enter(&self, call: SourceCall) -> Result<(), ProviderError> {
        self.with(|s| {
            s.calls.push(call);
            if s.permission_denied {
                Err(ProviderError::PermissionDenied {
                    source_name: self.name.clone(),
                })
            } else if s.unavailable {
                Err(ProviderError::Unavailable {
                    source_name: self.name.clone(),
                    message: "switched off".into(),
                })
            } else {
                Ok(())
            }
        })
    }

    fn not_found(&self, external_id: &str) -> ProviderError {
        ProviderError::NotFound {
            source_name: self.name.clone(),
            external_id: external_id.to_string(),
        }
    }

    fn edit(
        &self,
        external_id: &str,
        f: impl FnOnce(&mut ExternalEntity) -> Result<(), ProviderError>,
    ) -> Result<(), ProviderError> {
        self.with(|s| match s.entities.get_mut(external_id) {
            Some(entity) => f(entity),
            None => Err(self.not_found(external_id)),
        })
    }

    fn reject_timeless_calendar(&self) -> Result<(), ProviderError> {
        if self.kind == LinkKind::Calendar {
            return Err(ProviderError::Rejected {
                source_name: self.name.clone(),
                message: "calendar events keep their start time".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ExternalSource for InMemorySource {
    fn kind(&self) -> LinkKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_entities(&self, range: DayWindow) -> Result<Vec<ExternalEntity>, ProviderError> {
        self.enter(SourceCall::FetchEntities(range))?;
        Ok(self.with(|s| {
            s.entities
                .values()
                .filter(|e| e.anchor.map_or(true, |a| a.overlaps(&range)))
                .cloned()
                .collect()
        }))
    }

    async fn fetch_by_id(&self, external_id: &str) -> Result<Option<ExternalEntity>, ProviderError> {
        self.enter(SourceCall::FetchById(external_id.to_string()))?;
        Ok(self.get(external_id))
    }

    async fn create(&self, payload: &WriteBack) -> Result<String, ProviderError> {
        self.enter(SourceCall::Create(payload.title.clone()))?;
        if payload.anchor.is_none() {
            self.reject_timeless_calendar()?;
        }
        let id = self.with(|s| {
            s.next_id += 1;
            format!("{}-{}", self.kind, s.next_id)
        });

        let is_done = match self.kind {
            LinkKind::Reminder => Some(payload.is_done),
            LinkKind::Calendar => None,
        };
        self.insert(ExternalEntity {
            external_id: id.clone(),
            title: payload.title.clone(),
            notes: payload.notes.clone(),
            anchor: payload.anchor,
            is_done,
        });
        Ok(id)
    }

    async fn update(&self, external_id: &str, payload: &WriteBack) -> Result<(), ProviderError> {
        self.enter(SourceCall::Update(external_id.to_string()))?;
        self.edit(external_id, |e| {
            e.title = payload.title.clone();
            e.notes = payload.notes.clone();
            Ok(())
        })
    }

    async fn set_done(&self, external_id: &str) -> Result<(), ProviderError> {
        self.enter(SourceCall::SetDone(external_id.to_string()))?;
        self.edit(external_id, |e| {
            e.is_done = Some(true);
            Ok(())
        })
    }

    async fn set_not_done(&self, external_id: &str) -> Result<(), ProviderError> {
        self.enter(SourceCall::SetNotDone(external_id.to_string()))?;
        self.edit(external_id, |e| {
            e.is_done = Some(false);
            Ok(())
        })
    }

    async fn clear_anchor_time(&self, external_id: &str) -> Result<(), ProviderError> {
        self.enter(SourceCall::ClearAnchorTime(external_id.to_string()))?;
        self.reject_timeless_calendar()?;
        self.edit(external_id, |e| {
            e.anchor = e.anchor.map(|a| a.without_time());
            Ok(())
        })
    }

    async fn delete(&self, external_id: &str) -> Result<(), ProviderError> {
        self.enter(SourceCall::Delete(external_id.to_string()))?;
        match self.remove(external_id) {
            Some(_) => Ok(()),
            None => Err(self.not_found(external_id)),
        }
    }
}
