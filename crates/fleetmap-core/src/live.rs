// ── Live location sync ──
//
// Applies single-location change events to the store, in arrival order,
// without batching. Each event carries full replacement state for the
// field groups it includes (position, status counts), so replays are
// idempotent. When an event carries a revision, a field group only
// accepts a strictly newer one; position and status are tracked apart.

use tracing::{debug, trace};

use crate::model::{EntityId, GeoPoint, Position, Revision, StatusCounts};
use crate::popup::PopupState;
use crate::render::MapSurface;
use crate::store::LocationStore;

/// One location change from the live stream.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationUpdate {
    pub id: EntityId,
    pub position: Option<GeoPoint>,
    pub counts: Option<StatusCounts>,
    pub revision: Option<Revision>,
}

impl LocationUpdate {
    pub fn moved(id: EntityId, to: GeoPoint) -> Self {
        Self {
            id,
            position: Some(to),
            counts: None,
            revision: None,
        }
    }

    pub fn with_counts(mut self, counts: StatusCounts) -> Self {
        self.counts = Some(counts);
        self
    }

    pub fn with_revision(mut self, revision: Revision) -> Self {
        self.revision = Some(revision);
        self
    }
}

/// What happened to one field group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldChange {
    /// The update did not carry this group.
    Absent,
    Applied,
    /// Same value as already stored.
    Unchanged,
    /// Older than the revision already applied; dropped.
    Stale,
}

/// Result of applying one update to a known location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedUpdate {
    pub position: FieldChange,
    pub status: FieldChange,
}

impl AppliedUpdate {
    pub fn moved(&self) -> bool {
        self.position == FieldChange::Applied
    }

    pub fn changed(&self) -> bool {
        self.moved() || self.status == FieldChange::Applied
    }
}

/// Apply `update` to the store. Returns `None` for an unknown location.
pub fn apply_update(store: &LocationStore, update: &LocationUpdate) -> Option<AppliedUpdate> {
    let mut applied = AppliedUpdate {
        position: FieldChange::Absent,
        status: FieldChange::Absent,
    };

    let stored = store.update_location(&update.id, |loc| {
        let before = loc.revisions;
        applied.position = apply_field(
            &mut loc.position,
            update.position.map(|p| Some(Position::Geo(p))),
            &mut loc.revisions.position,
            update.revision,
        );
        applied.status = apply_field(
            &mut loc.counts,
            update.counts,
            &mut loc.revisions.status,
            update.revision,
        );
        applied.changed() || loc.revisions != before
    });

    if stored.is_none() {
        debug!(id = %update.id, "live update for unknown location ignored");
        return None;
    }
    trace!(id = %update.id, ?applied, "live update applied");
    Some(applied)
}

fn apply_field<T: PartialEq>(
    current: &mut T,
    incoming: Option<T>,
    applied_revision: &mut Option<Revision>,
    revision: Option<Revision>,
) -> FieldChange {
    let Some(value) = incoming else {
        return FieldChange::Absent;
    };
    if let (Some(new), Some(old)) = (revision, *applied_revision) {
        if !new.supersedes(&old) {
            return FieldChange::Stale;
        }
    }
    if revision.is_some() {
        *applied_revision = revision;
    }
    if *current == value {
        FieldChange::Unchanged
    } else {
        *current = value;
        FieldChange::Applied
    }
}

/// Move a marker on the surface. If the popup is open on that location
/// it follows: hide, move, reposition, show, with no render in between.
/// Returns whether the popup moved.
pub fn move_marker<M: MapSurface>(
    surface: &mut M,
    popup: &mut PopupState,
    id: &EntityId,
    to: GeoPoint,
) -> bool {
    if popup.is_open_for(id) {
        surface.hide_popup();
        surface.move_marker(id, to);
        popup.reposition(id, to);
        surface.show_popup(to);
        true
    } else {
        surface.move_marker(id, to);
        false
    }
}
