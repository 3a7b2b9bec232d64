// ── Location popup state ──
//
// Closed → Loading → Open, back to Closed on close or failure. A
// response for a location the popup no longer waits on is ignored.

use crate::model::{EntityId, GeoPoint};

#[derive(Debug, Clone, Default, PartialEq)]
pub enum PopupState {
    #[default]
    Closed,
    /// First roster page requested for `location`.
    Loading { location: EntityId },
    Open { location: EntityId, anchor: GeoPoint },
}

impl PopupState {
    /// Start loading a popup, replacing whatever was shown.
    pub fn begin(&mut self, location: EntityId) {
        *self = Self::Loading { location };
    }

    /// Open the popup if it is still waiting on `location`.
    pub fn open(&mut self, location: &EntityId, anchor: GeoPoint) -> bool {
        if self.is_loading_for(location) {
            *self = Self::Open {
                location: location.clone(),
                anchor,
            };
            true
        } else {
            false
        }
    }

    /// Give up on a pending popup. Ignored if the popup moved on.
    pub fn fail(&mut self, location: &EntityId) {
        if self.is_loading_for(location) {
            *self = Self::Closed;
        }
    }

    pub fn close(&mut self) {
        *self = Self::Closed;
    }

    /// Move an open popup to a new anchor. Returns `false` if the popup
    /// is not open on `location`.
    pub fn reposition(&mut self, location: &EntityId, to: GeoPoint) -> bool {
        match self {
            Self::Open {
                location: open,
                anchor,
            } if open == location => {
                *anchor = to;
                true
            }
            _ => false,
        }
    }

    pub fn location(&self) -> Option<&EntityId> {
        match self {
            Self::Closed => None,
            Self::Loading { location } | Self::Open { location, .. } => Some(location),
        }
    }

    pub fn is_open_for(&self, id: &EntityId) -> bool {
        matches!(self, Self::Open { location, .. } if location == id)
    }

    fn is_loading_for(&self, id: &EntityId) -> bool {
        matches!(self, Self::Loading { location } if location == id)
    }
}
