// ── Wire types ──
//
// Raw response shapes as the server sends them. These are deliberately
// loose: ids may be numbers or strings, geometries may be points or
// polygons, and the bulk feed comes either as GeoJSON `features` or as
// NetJSON `nodes`. `fleetmap-core` normalizes all of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Bulk location feed ──────────────────────────────────────────────

/// One page of the bulk location feed.
///
/// Either `features` (GeoJSON) or `nodes` (NetJSON) is populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoCollection {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub features: Vec<GeoFeature>,
    #[serde(default)]
    pub nodes: Vec<NetNode>,
}

impl GeoCollection {
    /// Number of entries on this page, whichever shape was used.
    pub fn len(&self) -> usize {
        self.features.len() + self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A GeoJSON feature describing one location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoFeature {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: LocationProperties,
}

/// GeoJSON geometry. Coordinates stay untyped because polygons nest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub coordinates: Value,
}

/// Per-location properties: name plus the per-status device counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationProperties {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ok_count: Option<u32>,
    #[serde(default)]
    pub problem_count: Option<u32>,
    #[serde(default)]
    pub critical_count: Option<u32>,
    #[serde(default)]
    pub unknown_count: Option<u32>,
    #[serde(default)]
    pub deactivated_count: Option<u32>,
    #[serde(default)]
    pub device_count: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub floor: Option<i32>,
}

/// A NetJSON node describing one location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetNode {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub location: Option<NodeLocation>,
    /// Bare `[lng, lat]` pair, used by some feeds instead of `location`.
    #[serde(default)]
    pub coordinates: Option<Value>,
    #[serde(default)]
    pub properties: LocationProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeLocation {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

// ── Location roster ─────────────────────────────────────────────────

/// One page of the per-location device roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterResponse {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub has_floorplan: bool,
    #[serde(default)]
    pub results: Vec<RosterDevice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterDevice {
    pub id: Value,
    pub name: String,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub admin_edit_url: Option<String>,
    #[serde(default)]
    pub monitoring: Option<DeviceMonitoring>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceMonitoring {
    pub status: String,
    #[serde(default)]
    pub status_label: Option<String>,
}

// ── Indoor floorplan ────────────────────────────────────────────────

/// One page of indoor device coordinates for a location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FloorPlanResponse {
    #[serde(default)]
    pub floors: Vec<i32>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub results: Vec<IndoorDevice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndoorDevice {
    #[serde(default)]
    pub device_id: Option<Value>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    pub floor: i32,
    #[serde(default)]
    pub floor_name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    /// `{ "x": .., "y": .. }` or the map-style `{ "lng": .., "lat": .. }`.
    #[serde(default)]
    pub coordinates: Option<Value>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub monitoring: Option<DeviceMonitoring>,
}

// ── Live location stream ────────────────────────────────────────────

/// A single location change pushed over the websocket.
///
/// Carries full replacement state for whatever it includes: a geometry,
/// status counters in `properties`, or both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationEvent {
    pub id: Value,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Option<LocationProperties>,
    #[serde(default)]
    pub sequence: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}
