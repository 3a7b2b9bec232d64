// ── Antimeridian wrapping ──
//
// When the viewport is panned past ±180° longitude the map shows a
// neighbouring world copy. Markers are duplicated onto that copy once per
// dataset, shifted by ∓360°, so the copy is not empty.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{DeviceLocation, EntityId, GeoPoint};
use crate::store::LocationStore;

/// Visible map area in degrees. `west`/`east` may exceed ±180 when a
/// neighbouring world copy is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

/// A neighbouring world copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorldCopy {
    West,
    East,
}

impl WorldCopy {
    /// Longitude shift from the primary world to this copy.
    pub fn offset(self) -> f64 {
        match self {
            Self::West => -360.0,
            Self::East => 360.0,
        }
    }

    /// Whether a source at `lng` gets a ghost on this copy.
    pub fn accepts(self, lng: f64) -> bool {
        match self {
            Self::West => lng <= 180.0,
            Self::East => lng >= -180.0,
        }
    }
}

/// Non-authoritative duplicate of a location on a world copy.
///
/// Holds only the source id; position and status are read from the
/// source when rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostFeature {
    pub source: EntityId,
    pub copy: WorldCopy,
}

impl GhostFeature {
    /// Where the ghost of `source` sits, or `None` if it has no geometry.
    pub fn point(&self, source: &DeviceLocation) -> Option<GeoPoint> {
        source.geo().map(|p| p.shifted(self.copy.offset()))
    }
}

/// What a viewport change appended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WrapOutcome {
    pub west: Option<usize>,
    pub east: Option<usize>,
}

impl WrapOutcome {
    pub fn changed(&self) -> bool {
        self.west.is_some() || self.east.is_some()
    }
}

/// One-shot world-copy flags for a map session.
#[derive(Debug, Clone, Copy, Default)]
pub struct AntimeridianWrapper {
    west_appended: bool,
    east_appended: bool,
}

impl AntimeridianWrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append ghosts for every copy that just came into view.
    ///
    /// Each copy is appended at most once until [`rearm`](Self::rearm).
    pub fn on_viewport_change(
        &mut self,
        bounds: &ViewportBounds,
        store: &LocationStore,
    ) -> WrapOutcome {
        let mut outcome = WrapOutcome::default();

        if bounds.west < -180.0 && !self.west_appended {
            let added = store.append_ghosts(WorldCopy::West);
            self.west_appended = true;
            debug!(added, "appended west world copy");
            outcome.west = Some(added);
        }
        if bounds.east > 180.0 && !self.east_appended {
            let added = store.append_ghosts(WorldCopy::East);
            self.east_appended = true;
            debug!(added, "appended east world copy");
            outcome.east = Some(added);
        }

        outcome
    }

    /// Clear both flags. Called after a full dataset reload.
    pub fn rearm(&mut self) {
        *self = Self::default();
    }

    pub fn is_appended(&self, copy: WorldCopy) -> bool {
        match copy {
            WorldCopy::West => self.west_appended,
            WorldCopy::East => self.east_appended,
        }
    }
}
