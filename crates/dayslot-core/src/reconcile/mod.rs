//! Reconciliation of local items against one external source.
//!
//! A pass diffs the source's snapshot against the items linked to that
//! source and adds, updates or deletes local items to match.
//!
//! ## Phases
//! Source calls may suspend, store mutations never do. A pass is therefore
//! split so the store is only borrowed by the synchronous steps:
//!
//! 1. [`Reconciler::fetch`] (async) pulls entities for the active window
//!    widened by the fetch margin.
//! 2. [`Reconciler::apply`] (sync) creates and updates items and collects
//!    linked items the fetch did not return.
//! 3. [`Reconciler::resolve`] (async) looks each unseen entity up by id.
//! 4. [`Reconciler::finish`] (sync) deletes items whose entity is gone or
//!    has left the window.
//!
//! [`Reconciler::reconcile`] runs all four back to back. The planner
//! interleaves the phases of two sources so both fetch concurrently.
//!
//! ## Usage
//! ```rust,ignore
//! let reconciler = Reconciler::new(LinkKind::Calendar, 2);
//! let summary = reconciler.reconcile(&mut store, &calendar, &config.windows).await;
//! println!("{}", summary.message());
//! ```

mod merge;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use crate::item::{ItemId, ItemStore, LinkKind};
use crate::sync::{ExternalEntity, ExternalSource};
use crate::window::{active_window, DayWindow, TimeWindowConfig};

/// Default number of days fetched on each side of the active window.
pub const DEFAULT_FETCH_MARGIN_DAYS: i64 = 2;

/// How a pass ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    /// The pass ran to the end.
    Completed,
    /// The source is switched off in configuration.
    Disabled,
    /// Access to the source was not granted; nothing was touched.
    PermissionDenied,
    /// The source or the window could not be read; nothing was touched.
    Failed { message: String },
}

/// Outcome of one pass over one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub source: LinkKind,
    pub status: ReconcileStatus,
    /// Items created for newly seen entities.
    pub added: usize,
    /// Linked items whose fields changed.
    pub updated: usize,
    /// Linked items removed because their entity is gone or out of range.
    pub deleted: usize,
    /// Malformed entities passed over.
    pub skipped: usize,
}

impl ReconcileSummary {
    pub fn new(source: LinkKind, status: ReconcileStatus) -> Self {
        Self {
            source,
            status,
            added: 0,
            updated: 0,
            deleted: 0,
            skipped: 0,
        }
    }

    /// Total store mutations made by the pass.
    pub fn mutations(&self) -> usize {
        self.added + self.updated + self.deleted
    }

    pub fn has_changes(&self) -> bool {
        self.mutations() > 0
    }

    pub fn is_permission_denied(&self) -> bool {
        self.status == ReconcileStatus::PermissionDenied
    }

    /// One-line human-readable description.
    pub fn message(&self) -> String {
        match &self.status {
            ReconcileStatus::Disabled => format!("{}: disabled", self.source),
            ReconcileStatus::PermissionDenied => format!("{}: access not granted", self.source),
            ReconcileStatus::Failed { message } => format!("{}: failed ({message})", self.source),
            ReconcileStatus::Completed if !self.has_changes() && self.skipped == 0 => {
                format!("{}: up to date", self.source)
            }
            ReconcileStatus::Completed => format!(
                "{}: {} added, {} updated, {} deleted, {} skipped",
                self.source, self.added, self.updated, self.deleted, self.skipped
            ),
        }
    }
}

/// Result of a direct lookup for an entity the fetch did not return.
#[derive(Debug, Clone)]
enum Lookup {
    Gone,
    Found(ExternalEntity),
    /// The source could not answer; the item is left alone.
    Unknown,
}

/// State carried from [`Reconciler::apply`] to [`Reconciler::resolve`].
#[derive(Debug, Clone)]
pub struct PendingPass {
    window: DayWindow,
    summary: ReconcileSummary,
    unseen: Vec<(ItemId, String)>,
}

impl PendingPass {
    pub fn summary(&self) -> &ReconcileSummary {
        &self.summary
    }
}

/// State carried from [`Reconciler::resolve`] to [`Reconciler::finish`].
#[derive(Debug, Clone)]
pub struct ResolvedPass {
    window: DayWindow,
    summary: ReconcileSummary,
    resolved: Vec<(ItemId, String, Lookup)>,
}

/// Reconciler for one source kind.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    kind: LinkKind,
    fetch_margin_days: i64,
}

impl Reconciler {
    pub fn new(kind: LinkKind, fetch_margin_days: i64) -> Self {
        Self {
            kind,
            fetch_margin_days: fetch_margin_days.max(0),
        }
    }

    pub fn kind(&self) -> LinkKind {
        self.kind
    }

    /// Run a whole pass against the window that contains the store's "now".
    pub async fn reconcile(
        &self,
        store: &mut ItemStore,
        source: &dyn ExternalSource,
        windows: &TimeWindowConfig,
    ) -> ReconcileSummary {
        let window = match active_window(store.now(), windows.rollover_time()) {
            Ok(window) => window,
            Err(e) => {
                warn!(source = %self.kind, error = %e, "cannot compute active window");
                return ReconcileSummary::new(
                    self.kind,
                    ReconcileStatus::Failed {
                        message: e.to_string(),
                    },
                );
            }
        };

        let fetched = self.fetch(source, window).await;
        let pending = self.apply(store, window, windows, fetched);
        let resolved = self.resolve(source, pending).await;
        self.finish(store, windows, resolved)
    }

    /// Phase 1: fetch entities around `window`.
    ///
    /// A failure is already the final status of the pass: the source
    /// refused or failed, or the widened range has no valid dates.
    pub async fn fetch(
        &self,
        source: &dyn ExternalSource,
        window: DayWindow,
    ) -> Result<Vec<ExternalEntity>, ReconcileStatus> {
        let range = window.expanded(self.fetch_margin_days).map_err(|e| {
            warn!(source = %self.kind, error = %e, "cannot widen fetch range");
            ReconcileStatus::Failed {
                message: e.to_string(),
            }
        })?;
        source.fetch_entities(range).await.map_err(|e| self.fetch_failed(e))
    }

    fn fetch_failed(&self, error: ProviderError) -> ReconcileStatus {
        if error.is_permission_denied() {
            info!(source = %self.kind, "access not granted, skipping pass");
            ReconcileStatus::PermissionDenied
        } else {
            warn!(source = %self.kind, error = %error, "fetch failed, skipping pass");
            ReconcileStatus::Failed {
                message: error.to_string(),
            }
        }
    }

    /// Phase 2: create and update items from the fetched snapshot.
    pub fn apply(
        &self,
        store: &mut ItemStore,
        window: DayWindow,
        windows: &TimeWindowConfig,
        fetched: Result<Vec<ExternalEntity>, ReconcileStatus>,
    ) -> PendingPass {
        let entities = match fetched {
            Ok(entities) => entities,
            Err(status) => {
                return PendingPass {
                    window,
                    summary: ReconcileSummary::new(self.kind, status),
                    unseen: Vec::new(),
                };
            }
        };

        let mut summary = ReconcileSummary::new(self.kind, ReconcileStatus::Completed);
        let boundary = windows.rollover_time();
        let now = store.now();
        let mut seen: HashSet<String> = HashSet::new();

        for entity in &entities {
            if entity.external_id.trim().is_empty() {
                debug!(source = %self.kind, title = %entity.title, "entity without id, skipped");
                summary.skipped += 1;
                continue;
            }
            seen.insert(entity.external_id.clone());

            let instant = match entity.anchor.map(|a| a.instant(boundary)).transpose() {
                Ok(instant) => instant,
                Err(e) => {
                    debug!(source = %self.kind, external_id = %entity.external_id, error = %e, "unusable anchor, skipped");
                    summary.skipped += 1;
                    continue;
                }
            };

            let existing = store.find_by_link(self.kind, &entity.external_id).cloned();
            match existing {
                Some(local) => {
                    if local.is_anchored() && instant.is_none() {
                        // An anchored item without a usable date cannot be
                        // windowed; leave it for the next complete snapshot.
                        debug!(source = %self.kind, external_id = %entity.external_id, "linked entity lost its date, skipped");
                        summary.skipped += 1;
                        continue;
                    }
                    let next = merge::merged(&local, entity, instant, windows, now);
                    if next != local {
                        match store.update(next) {
                            Ok(_) => {
                                debug!(source = %self.kind, item = %local.id, "item updated from source");
                                summary.updated += 1;
                            }
                            Err(e) => warn!(source = %self.kind, item = %local.id, error = %e, "update rejected"),
                        }
                    }
                }
                None => {
                    let Some(at) = instant else {
                        debug!(source = %self.kind, external_id = %entity.external_id, "entity has no date, skipped");
                        summary.skipped += 1;
                        continue;
                    };
                    if !window.contains(at) {
                        continue;
                    }
                    if entity.is_done == Some(true) {
                        debug!(source = %self.kind, external_id = %entity.external_id, "already done, not imported");
                        continue;
                    }
                    let item = merge::new_item(entity, self.kind, at, windows, now);
                    match store.add(item) {
                        Ok(id) => {
                            debug!(source = %self.kind, item = %id, external_id = %entity.external_id, "item created from source");
                            summary.added += 1;
                        }
                        Err(e) => warn!(source = %self.kind, error = %e, "create rejected"),
                    }
                }
            }
        }

        let unseen = store
            .items()
            .iter()
            .filter_map(|item| {
                let ext = item.link(self.kind)?;
                (!seen.contains(ext)).then(|| (item.id.clone(), ext.to_string()))
            })
            .collect();

        PendingPass {
            window,
            summary,
            unseen,
        }
    }

    /// Phase 3: look up linked entities the fetch did not return.
    pub async fn resolve(&self, source: &dyn ExternalSource, pending: PendingPass) -> ResolvedPass {
        let PendingPass {
            window,
            summary,
            unseen,
        } = pending;

        let mut resolved = Vec::with_capacity(unseen.len());
        for (item_id, external_id) in unseen {
            let lookup = match source.fetch_by_id(&external_id).await {
                Ok(Some(entity)) => Lookup::Found(entity),
                Ok(None) => Lookup::Gone,
                Err(e) => {
                    warn!(source = %self.kind, %external_id, error = %e, "lookup failed, keeping item");
                    Lookup::Unknown
                }
            };
            resolved.push((item_id, external_id, lookup));
        }

        ResolvedPass {
            window,
            summary,
            resolved,
        }
    }

    /// Phase 4: settle unseen items and log the pass.
    pub fn finish(
        &self,
        store: &mut ItemStore,
        windows: &TimeWindowConfig,
        resolved: ResolvedPass,
    ) -> ReconcileSummary {
        let ResolvedPass {
            window,
            mut summary,
            resolved,
        } = resolved;
        let boundary = windows.rollover_time();
        let now = store.now();

        for (item_id, external_id, lookup) in resolved {
            // the item may have changed while the lookup was in flight
            let Some(local) = store
                .get(&item_id)
                .filter(|i| i.link(self.kind) == Some(external_id.as_str()))
                .cloned()
            else {
                continue;
            };

            let entity = match lookup {
                Lookup::Unknown => continue,
                Lookup::Gone => {
                    debug!(source = %self.kind, item = %item_id, %external_id, "entity gone, deleting item");
                    if store.delete(&item_id).is_some() {
                        summary.deleted += 1;
                    }
                    continue;
                }
                Lookup::Found(entity) => entity,
            };

            let instant = match entity.anchor.map(|a| a.instant(boundary)).transpose() {
                Ok(instant) => instant,
                Err(e) => {
                    debug!(source = %self.kind, %external_id, error = %e, "unusable anchor, skipped");
                    summary.skipped += 1;
                    continue;
                }
            };

            if local.is_anchored() {
                match instant {
                    Some(at) if local.deferred_from == Some(at) => {}
                    Some(at) if !window.contains(at) => {
                        debug!(source = %self.kind, item = %item_id, %external_id, "entity left the window, deleting item");
                        if store.delete(&item_id).is_some() {
                            summary.deleted += 1;
                        }
                        continue;
                    }
                    Some(_) => {}
                    None => {
                        summary.skipped += 1;
                        continue;
                    }
                }
            }

            let next = merge::merged(&local, &entity, instant, windows, now);
            if next != local {
                match store.update(next) {
                    Ok(_) => summary.updated += 1,
                    Err(e) => warn!(source = %self.kind, item = %item_id, error = %e, "update rejected"),
                }
            }
        }

        info!(
            source = %self.kind,
            added = summary.added,
            updated = summary.updated,
            deleted = summary.deleted,
            skipped = summary.skipped,
            "reconcile pass finished"
        );
        summary
    }
}

impl PendingPass {
    /// Whether later phases have anything to do.
    pub fn is_completed(&self) -> bool {
        self.summary.status == ReconcileStatus::Completed
    }
}
