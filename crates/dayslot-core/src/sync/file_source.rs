//! Source backed by a JSON document on disk.
//!
//! Stands in for a native calendar or reminders store: the CLI reads and
//! edits the same file the reconciler consumes. A missing file is an empty
//! source.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::{ExternalEntity, ExternalSource, WriteBack};
use crate::error::ProviderError;
use crate::item::LinkKind;
use crate::window::DayWindow;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SourceDocument {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    entities: Vec<ExternalEntity>,
}

impl SourceDocument {
    fn find_mut(&mut self, external_id: &str) -> Option<&mut ExternalEntity> {
        self.entities.iter_mut().find(|e| e.external_id == external_id)
    }
}

/// File-backed [`ExternalSource`].
pub struct JsonFileSource {
    kind: LinkKind,
    name: String,
    path: PathBuf,
    // serializes read-modify-write cycles within the process
    lock: Mutex<()>,
}

impl JsonFileSource {
    pub fn new(kind: LinkKind, path: impl Into<PathBuf>) -> Self {
        let name = match kind {
            LinkKind::Calendar => "calendar",
            LinkKind::Reminder => "reminders",
        };
        Self {
            kind,
            name: name.to_string(),
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every entity in the file.
    pub async fn list(&self) -> Result<Vec<ExternalEntity>, ProviderError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.entities)
    }

    async fn load(&self) -> Result<SourceDocument, ProviderError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(SourceDocument::default()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SourceDocument::default()),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Err(ProviderError::PermissionDenied {
                    source_name: self.name.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, doc: &SourceDocument) -> Result<(), ProviderError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(doc)?;
        tokio::fs::write(&self.path, json).await?;
        debug!(path = %self.path.display(), count = doc.entities.len(), "source file written");
        Ok(())
    }

    async fn edit<F>(&self, external_id: &str, f: F) -> Result<(), ProviderError>
    where
        F: FnOnce(&mut ExternalEntity) -> Result<(), ProviderError> + Send,
    {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        let entity = doc
            .find_mut(external_id)
            .ok_or_else(|| self.not_found(external_id))?;
        f(entity)?;
        self.store(&doc).await
    }

    fn not_found(&self, external_id: &str) -> ProviderError {
        ProviderError::NotFound {
            source_name: self.name.clone(),
            external_id: external_id.to_string(),
        }
    }

    fn rejected(&self, message: &str) -> ProviderError {
        ProviderError::Rejected {
            source_name: self.name.clone(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl ExternalSource for JsonFileSource {
    fn kind(&self) -> LinkKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_entities(&self, range: DayWindow) -> Result<Vec<ExternalEntity>, ProviderError> {
        let entities = self.list().await?;
        Ok(entities
            .into_iter()
            .filter(|e| e.anchor.map_or(true, |a| a.overlaps(&range)))
            .collect())
    }

    async fn fetch_by_id(&self, external_id: &str) -> Result<Option<ExternalEntity>, ProviderError> {
        let entities = self.list().await?;
        Ok(entities.into_iter().find(|e| e.external_id == external_id))
    }

    async fn create(&self, payload: &WriteBack) -> Result<String, ProviderError> {
        if payload.anchor.is_none() && self.kind == LinkKind::Calendar {
            return Err(self.rejected("calendar events need a start time"));
        }
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        doc.next_id += 1;
        let id = format!("{}-{}", self.kind, doc.next_id);
        doc.entities.push(ExternalEntity {
            external_id: id.clone(),
            title: payload.title.clone(),
            notes: payload.notes.clone(),
            anchor: payload.anchor,
            is_done: (self.kind == LinkKind::Reminder).then_some(payload.is_done),
        });
        self.store(&doc).await?;
        Ok(id)
    }

    async fn update(&self, external_id: &str, payload: &WriteBack) -> Result<(), ProviderError> {
        let title = payload.title.clone();
        let notes = payload.notes.clone();
        self.edit(external_id, move |e| {
            e.title = title;
            e.notes = notes;
            Ok(())
        })
        .await
    }

    async fn set_done(&self, external_id: &str) -> Result<(), ProviderError> {
        if self.kind == LinkKind::Calendar {
            return Err(self.rejected("calendar events have no completion state"));
        }
        self.edit(external_id, |e| {
            e.is_done = Some(true);
            Ok(())
        })
        .await
    }

    async fn set_not_done(&self, external_id: &str) -> Result<(), ProviderError> {
        if self.kind == LinkKind::Calendar {
            return Err(self.rejected("calendar events have no completion state"));
        }
        self.edit(external_id, |e| {
            e.is_done = Some(false);
            Ok(())
        })
        .await
    }

    async fn clear_anchor_time(&self, external_id: &str) -> Result<(), ProviderError> {
        if self.kind == LinkKind::Calendar {
            return Err(self.rejected("calendar events keep their start time"));
        }
        self.edit(external_id, |e| {
            e.anchor = e.anchor.map(|a| a.without_time());
            Ok(())
        })
        .await
    }

    async fn delete(&self, external_id: &str) -> Result<(), ProviderError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        let before = doc.entities.len();
        doc.entities.retain(|e| e.external_id != external_id);
        if doc.entities.len() == before {
            return Err(self.not_found(external_id));
        }
        self.store(&doc).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::Anchor;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(d: u32, h: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn payload(title: &str, anchor: Option<Anchor>) -> WriteBack {
        WriteBack {
            title: title.into(),
            notes: None,
            anchor,
            is_done: false,
        }
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let source = JsonFileSource::new(LinkKind::Calendar, dir.path().join("calendar.json"));
        assert!(source.list().await.unwrap().is_empty());
        assert!(source.fetch_by_id("x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn created_entities_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("reminders.json");
        let source = JsonFileSource::new(LinkKind::Reminder, &path);

        let id = source
            .create(&payload("pills", Some(Anchor::At(at(17, 19)))))
            .await
            .unwrap();
        source.set_done(&id).await.unwrap();

        let reopened = JsonFileSource::new(LinkKind::Reminder, &path);
        let entity = reopened.fetch_by_id(&id).await.unwrap().unwrap();
        assert_eq!(entity.title, "pills");
        assert_eq!(entity.is_done, Some(true));

        reopened.clear_anchor_time(&id).await.unwrap();
        let entity = reopened.fetch_by_id(&id).await.unwrap().unwrap();
        assert_eq!(entity.anchor, Some(Anchor::Date(at(17, 0).date())));
    }

    #[tokio::test]
    async fn fetch_respects_range_and_ids_do_not_repeat() {
        let dir = TempDir::new().unwrap();
        let source = JsonFileSource::new(LinkKind::Calendar, dir.path().join("calendar.json"));
        let a = source.create(&payload("a", Some(Anchor::At(at(17, 9))))).await.unwrap();
        let b = source.create(&payload("b", Some(Anchor::At(at(28, 9))))).await.unwrap();
        assert_ne!(a, b);

        source.delete(&a).await.unwrap();
        let c = source.create(&payload("c", Some(Anchor::At(at(17, 10))))).await.unwrap();
        assert_ne!(a, c);

        let range = DayWindow {
            start: at(15, 6),
            end: at(20, 6),
        };
        let fetched = source.fetch_entities(range).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].external_id, c);
    }

    #[tokio::test]
    async fn calendar_rejects_timeless_events() {
        let dir = TempDir::new().unwrap();
        let source = JsonFileSource::new(LinkKind::Calendar, dir.path().join("calendar.json"));
        assert!(matches!(
            source.create(&payload("x", None)).await,
            Err(ProviderError::Rejected { .. })
        ));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calendar.json");
        std::fs::write(&path, "{not json").unwrap();
        let source = JsonFileSource::new(LinkKind::Calendar, &path);
        assert!(matches!(source.list().await, Err(ProviderError::Json(_))));
    }
}
