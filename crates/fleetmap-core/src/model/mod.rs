// ── Domain model ──
//
// Normalized, server-agnostic types. Nothing here knows about GeoJSON
// or NetJSON; see `convert` for that.

pub mod device;
pub mod entity_id;
pub mod floor;
pub mod location;
pub mod status;

pub use device::{Device, RosterPage};
pub use entity_id::{EntityId, MacAddress};
pub use floor::{Floor, FloorPlanPage, IndoorPlacement};
pub use location::{DeviceLocation, GeoPoint, PlanarPoint, Position, Revision, Revisions};
pub use status::{Status, StatusCounts, StatusPalette, resolve_status};
