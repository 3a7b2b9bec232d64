// fleetmap-core: Map engine between fleetmap-api and its consumers (CLI, map surfaces).

pub mod antimeridian;
pub mod config;
pub mod convert;
pub mod error;
pub mod floorplan;
pub mod floors;
pub mod indoor;
pub mod live;
pub mod model;
pub mod popup;
pub mod render;
pub mod roster;
pub mod source;
pub mod store;
pub mod stream;
pub mod viewer;

// ── Primary re-exports ──────────────────────────────────────────────
pub use antimeridian::{AntimeridianWrapper, GhostFeature, ViewportBounds, WorldCopy};
pub use config::{FloorConfig, RosterConfig, ServerConfig, TlsVerification, ViewerConfig};
pub use error::CoreError;
pub use floorplan::{FloorPlanSession, FloorView, IndoorMarker};
pub use floors::FloorNavigator;
pub use indoor::{ImageDimensions, IndoorProjector, OverlayBounds};
pub use live::{AppliedUpdate, FieldChange, LocationUpdate};
pub use popup::PopupState;
pub use render::{MapSurface, RenderFeature};
pub use roster::{RosterFilter, RosterOutcome, RosterPaginator, ScrollMetrics};
pub use source::{FixedImageSize, FloorImageLoader, FloorPlanSource, LocationSource, RosterSource};
pub use store::LocationStore;
pub use stream::{LocationFeed, LocationFeedStream};
pub use viewer::{InitialView, LoadSummary, MapViewer};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Device, DeviceLocation, EntityId, Floor, FloorPlanPage, GeoPoint, IndoorPlacement,
    MacAddress, PlanarPoint, Position, Revision, RosterPage, Status, StatusCounts,
    StatusPalette, resolve_status,
};
