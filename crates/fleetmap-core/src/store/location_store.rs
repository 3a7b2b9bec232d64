// ── Location store ──
//
// Authoritative locations plus the ghost copies drawn on neighbouring
// world copies. Ghosts only reference their source, so a live move of
// the source moves its ghosts too.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::collection::EntityCollection;
use crate::antimeridian::{GhostFeature, WorldCopy};
use crate::model::{DeviceLocation, EntityId, StatusPalette};
use crate::render::RenderFeature;
use crate::stream::LocationFeed;

/// Reactive store for the locations shown on the map.
pub struct LocationStore {
    pub(crate) locations: EntityCollection<DeviceLocation>,
    pub(crate) ghosts: watch::Sender<Arc<Vec<GhostFeature>>>,
    pub(crate) last_full_refresh: watch::Sender<Option<DateTime<Utc>>>,
    pub(crate) last_live_update: watch::Sender<Option<DateTime<Utc>>>,
}

impl LocationStore {
    pub fn new() -> Self {
        let (ghosts, _) = watch::channel(Arc::new(Vec::new()));
        let (last_full_refresh, _) = watch::channel(None);
        let (last_live_update, _) = watch::channel(None);

        Self {
            locations: EntityCollection::new(),
            ghosts,
            last_full_refresh,
            last_live_update,
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn locations_snapshot(&self) -> Arc<Vec<Arc<DeviceLocation>>> {
        self.locations.snapshot()
    }

    pub fn ghosts_snapshot(&self) -> Arc<Vec<GhostFeature>> {
        self.ghosts.borrow().clone()
    }

    pub fn location(&self, id: &EntityId) -> Option<Arc<DeviceLocation>> {
        self.locations.get(id)
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    /// Devices across all authoritative locations. Ghosts never count.
    pub fn device_total(&self) -> u64 {
        self.locations
            .snapshot()
            .iter()
            .map(|loc| loc.device_count())
            .sum()
    }

    /// Bumped on every location mutation.
    pub fn version(&self) -> u64 {
        self.locations.version()
    }

    pub fn last_full_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_full_refresh.borrow()
    }

    pub fn last_live_update(&self) -> Option<DateTime<Utc>> {
        *self.last_live_update.borrow()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_locations(&self) -> LocationFeed {
        LocationFeed::new(self.locations.subscribe())
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Replace the whole dataset. Ghosts from the previous dataset are
    /// dropped with it.
    pub fn replace_all(&self, locations: Vec<DeviceLocation>) {
        self.ghosts.send_modify(|g| *g = Arc::new(Vec::new()));
        self.locations
            .replace_all(locations.into_iter().map(|l| (l.id.clone(), l)).collect());
        self.last_full_refresh.send_replace(Some(Utc::now()));
    }

    /// Append a ghost for every placed location the copy accepts.
    /// Returns how many were added.
    pub(crate) fn append_ghosts(&self, copy: WorldCopy) -> usize {
        let added: Vec<GhostFeature> = self
            .locations
            .snapshot()
            .iter()
            .filter(|loc| loc.geo().is_some_and(|p| copy.accepts(p.lng)))
            .map(|loc| GhostFeature {
                source: loc.id.clone(),
                copy,
            })
            .collect();
        let count = added.len();
        if count > 0 {
            self.ghosts.send_modify(|ghosts| {
                let mut next = Vec::with_capacity(ghosts.len() + count);
                next.extend(ghosts.iter().cloned());
                next.extend(added);
                *ghosts = Arc::new(next);
            });
        }
        count
    }

    /// Apply `mutate` to a copy of a location and store the result.
    /// `mutate` returns whether anything changed; unchanged locations are
    /// not rewritten. Returns `None` for an unknown id.
    pub(crate) fn update_location<F>(&self, id: &EntityId, mutate: F) -> Option<bool>
    where
        F: FnOnce(&mut DeviceLocation) -> bool,
    {
        let current = self.locations.get(id)?;
        let mut next = DeviceLocation::clone(&current);
        let changed = mutate(&mut next);
        if changed {
            self.locations.upsert(id.clone(), next);
            self.last_live_update.send_replace(Some(Utc::now()));
        }
        Some(changed)
    }

    // ── Rendering ────────────────────────────────────────────────────

    /// Markers for every placed location followed by every ghost.
    /// Ghost positions are derived from their source at call time.
    pub fn render_features(&self, palette: &StatusPalette) -> Vec<RenderFeature> {
        let locations = self.locations.snapshot();
        let ghosts = self.ghosts_snapshot();

        let originals = locations.iter().filter_map(|loc| {
            let point = loc.geo()?;
            Some(feature(loc, point, None, palette))
        });
        let copies = ghosts.iter().filter_map(|ghost| {
            let source = self.locations.get(&ghost.source)?;
            let point = ghost.point(&source)?;
            Some(feature(&source, point, Some(ghost.copy), palette))
        });
        originals.chain(copies).collect()
    }
}

impl Default for LocationStore {
    fn default() -> Self {
        Self::new()
    }
}

fn feature(
    loc: &DeviceLocation,
    point: crate::model::GeoPoint,
    copy: Option<WorldCopy>,
    palette: &StatusPalette,
) -> RenderFeature {
    let status = loc.status();
    RenderFeature {
        id: loc.id.clone(),
        name: loc.name.clone(),
        point,
        status,
        color: palette.color(status).to_owned(),
        device_count: loc.device_count(),
        copy,
    }
}
