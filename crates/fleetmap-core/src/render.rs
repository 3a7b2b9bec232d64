// ── Render contract ──
//
// What the engine hands to a drawing surface. The engine never draws;
// a `MapSurface` implementation (web view, terminal, test recorder)
// turns these calls into pixels.

use serde::Serialize;

use crate::antimeridian::WorldCopy;
use crate::model::{EntityId, GeoPoint, Status};

/// One marker to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFeature {
    /// Id of the authoritative location. Ghost copies share it.
    pub id: EntityId,
    pub name: String,
    pub point: GeoPoint,
    pub status: Status,
    pub color: String,
    pub device_count: u64,
    /// Set for a world-copy duplicate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copy: Option<WorldCopy>,
}

impl RenderFeature {
    pub fn is_ghost(&self) -> bool {
        self.copy.is_some()
    }
}

/// A drawing surface driven by the map viewer.
pub trait MapSurface {
    /// Redraw every marker.
    fn render(&mut self, features: &[RenderFeature]);

    /// Move a single marker (and its ghosts) without a full redraw.
    fn move_marker(&mut self, id: &EntityId, to: GeoPoint);

    fn hide_popup(&mut self);

    fn show_popup(&mut self, at: GeoPoint);

    /// Show a blocking, user-visible error.
    fn alert(&mut self, message: &str);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{MapSurface, RenderFeature};
    use crate::model::{EntityId, GeoPoint};

    /// One call made on a [`RecordingSurface`].
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum SurfaceCall {
        Render(usize),
        MoveMarker(EntityId, GeoPoint),
        HidePopup,
        ShowPopup(GeoPoint),
        Alert(String),
    }

    /// Records every call in order.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSurface {
        pub(crate) calls: Vec<SurfaceCall>,
        pub(crate) last_render: Vec<RenderFeature>,
    }

    impl MapSurface for RecordingSurface {
        fn render(&mut self, features: &[RenderFeature]) {
            self.calls.push(SurfaceCall::Render(features.len()));
            self.last_render = features.to_vec();
        }

        fn move_marker(&mut self, id: &EntityId, to: GeoPoint) {
            self.calls.push(SurfaceCall::MoveMarker(id.clone(), to));
        }

        fn hide_popup(&mut self) {
            self.calls.push(SurfaceCall::HidePopup);
        }

        fn show_popup(&mut self, at: GeoPoint) {
            self.calls.push(SurfaceCall::ShowPopup(at));
        }

        fn alert(&mut self, message: &str) {
            self.calls.push(SurfaceCall::Alert(message.to_owned()));
        }
    }
}
