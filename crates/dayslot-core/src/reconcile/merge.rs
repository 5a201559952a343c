//! Field-level merge of an external entity into a local item.

use chrono::NaiveDateTime;

use crate::item::{Item, Kind, LinkKind, Status};
use crate::sync::ExternalEntity;
use crate::window::{classify, TimeWindowConfig};

/// The local item after taking in what the source reports.
///
/// Title and notes always follow the entity. The anchor is only tracked for
/// items that already carry one: the category always follows the anchor
/// under the current windows, a changed anchor also moves the item, and an
/// anchor equal to the one the item was deferred from leaves the deferral
/// alone. Unanchored items are never re-timed.
pub(crate) fn merged(
    local: &Item,
    entity: &ExternalEntity,
    instant: Option<NaiveDateTime>,
    windows: &TimeWindowConfig,
    now: NaiveDateTime,
) -> Item {
    let mut next = local.clone();
    next.title = entity.title.clone();
    next.memo = entity.notes.clone();

    if local.is_anchored() {
        match instant {
            Some(at) if local.deferred_from == Some(at) => {}
            Some(at) if local.start_time == Some(at) => {
                next.category = Some(classify(at, windows));
            }
            Some(at) => {
                next.start_time = Some(at);
                next.category = Some(classify(at, windows));
                next.deferred_from = None;
            }
            None => {
                next.start_time = None;
                next.deferred_from = None;
            }
        }
    }

    mirror_status(&mut next, entity.is_done, now);
    next
}

/// Two-way done mirror. Only flips between Done and NotStarted; an
/// in-progress item stays in progress while the entity is open.
pub(crate) fn mirror_status(item: &mut Item, is_done: Option<bool>, now: NaiveDateTime) {
    match is_done {
        Some(true) if !item.is_done() => item.apply_status(Status::Done, now),
        Some(false) if item.is_done() => item.apply_status(Status::NotStarted, now),
        _ => {}
    }
}

/// A fresh must-do item for an entity seen for the first time.
pub(crate) fn new_item(
    entity: &ExternalEntity,
    kind: LinkKind,
    at: NaiveDateTime,
    windows: &TimeWindowConfig,
    now: NaiveDateTime,
) -> Item {
    let mut item = Item::new(entity.title.clone(), Kind::MustDo, now)
        .with_category(Some(classify(at, windows)))
        .with_memo(entity.notes.clone());
    item.start_time = Some(at);
    item.set_link(kind, Some(entity.external_id.clone()));
    item
}
