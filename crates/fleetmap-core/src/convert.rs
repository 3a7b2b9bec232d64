// ── API-to-domain type conversions ──
//
// Bridges raw `fleetmap_api` wire shapes into canonical `fleetmap_core::model`
// types. The bulk feed is duck-typed: GeoJSON `features` and NetJSON
// `nodes` both normalize into `DeviceLocation`. A record that cannot be
// read is skipped with a `DataShapeMismatch`, never the whole page.

use serde_json::Value;
use tracing::warn;

use fleetmap_api::models::{
    FloorPlanResponse, GeoCollection, GeoFeature, IndoorDevice, LocationEvent,
    LocationProperties, NetNode, RosterDevice, RosterResponse,
};

use crate::error::CoreError;
use crate::live::LocationUpdate;
use crate::model::{
    Device, DeviceLocation, EntityId, FloorPlanPage, GeoPoint, IndoorPlacement, MacAddress,
    PlanarPoint, Position, Revision, RosterPage, Status, StatusCounts,
};

/// Records that converted, and the ones that were skipped.
#[derive(Debug)]
pub struct Converted<T> {
    pub items: Vec<T>,
    pub skipped: Vec<CoreError>,
}

impl<T> Default for Converted<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> Converted<T> {
    fn push(&mut self, result: Result<T, CoreError>) {
        match result {
            Ok(item) => self.items.push(item),
            Err(e) => {
                warn!(error = %e, "skipping malformed record");
                self.skipped.push(e);
            }
        }
    }
}

// ── Bulk location feed ──────────────────────────────────────────────

/// One normalized page of the bulk feed.
#[derive(Debug, Default)]
pub struct LocationPage {
    pub locations: Vec<DeviceLocation>,
    pub skipped: Vec<CoreError>,
    pub next: Option<String>,
}

impl From<GeoCollection> for LocationPage {
    fn from(page: GeoCollection) -> Self {
        let mut out = Converted::default();
        for feature in page.features {
            out.push(location_from_feature(feature));
        }
        for node in page.nodes {
            out.push(location_from_node(node));
        }
        Self {
            locations: out.items,
            skipped: out.skipped,
            next: page.next,
        }
    }
}

fn location_from_feature(feature: GeoFeature) -> Result<DeviceLocation, CoreError> {
    let id = feature
        .id
        .as_ref()
        .or(feature.properties.id.as_ref())
        .and_then(EntityId::from_json)
        .ok_or_else(|| CoreError::shape("location", "<missing>", "feature has no id"))?;

    let position = match &feature.geometry {
        None => None,
        Some(geometry) => match geometry.kind.as_deref() {
            Some("Point") => Some(Position::Geo(point_from_pair(&geometry.coordinates).ok_or_else(
                || CoreError::shape("location", id.to_string(), "invalid point coordinates"),
            )?)),
            other => {
                return Err(CoreError::shape(
                    "location",
                    id.to_string(),
                    format!("unsupported geometry {}", other.unwrap_or("<none>")),
                ));
            }
        },
    };

    let props = &feature.properties;
    Ok(DeviceLocation {
        name: display_name(props.name.as_deref(), &id),
        counts: counts_from_properties(props),
        floor: props.floor,
        position,
        id,
        revisions: Default::default(),
    })
}

fn location_from_node(node: NetNode) -> Result<DeviceLocation, CoreError> {
    let id = node
        .id
        .as_ref()
        .or(node.properties.id.as_ref())
        .and_then(EntityId::from_json)
        .ok_or_else(|| CoreError::shape("location", "<missing>", "node has no id"))?;

    let point = match (&node.location, &node.coordinates) {
        (Some(loc), _) => match (loc.lat, loc.lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        },
        (None, Some(pair)) => point_from_pair(pair),
        (None, None) => {
            return Ok(DeviceLocation {
                name: display_name(node.label.as_deref().or(node.properties.name.as_deref()), &id),
                counts: counts_from_properties(&node.properties),
                floor: node.properties.floor,
                position: None,
                id,
                revisions: Default::default(),
            });
        }
    };
    let point = point
        .filter(GeoPoint::is_valid)
        .ok_or_else(|| CoreError::shape("location", id.to_string(), "invalid node coordinates"))?;

    Ok(DeviceLocation {
        name: display_name(node.label.as_deref().or(node.properties.name.as_deref()), &id),
        counts: counts_from_properties(&node.properties),
        floor: node.properties.floor,
        position: Some(Position::Geo(point)),
        id,
        revisions: Default::default(),
    })
}

/// `[lng, lat]`, the GeoJSON order.
fn point_from_pair(value: &Value) -> Option<GeoPoint> {
    let pair = value.as_array()?;
    let [lng, lat] = pair.as_slice() else {
        return None;
    };
    let point = GeoPoint::new(lat.as_f64()?, lng.as_f64()?);
    point.is_valid().then_some(point)
}

fn display_name(name: Option<&str>, id: &EntityId) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => id.to_string(),
    }
}

/// Counters if the feed has any; otherwise a single-status population
/// built from `status` and `device_count`.
fn counts_from_properties(props: &LocationProperties) -> StatusCounts {
    let explicit = [
        props.ok_count,
        props.problem_count,
        props.critical_count,
        props.unknown_count,
        props.deactivated_count,
    ];
    if explicit.iter().any(Option::is_some) {
        return StatusCounts {
            ok: props.ok_count.unwrap_or_default(),
            problem: props.problem_count.unwrap_or_default(),
            critical: props.critical_count.unwrap_or_default(),
            unknown: props.unknown_count.unwrap_or_default(),
            deactivated: props.deactivated_count.unwrap_or_default(),
        };
    }
    match props.status.as_deref() {
        Some(raw) => StatusCounts::single(
            Status::parse_lenient(raw),
            props.device_count.unwrap_or(1),
        ),
        None => StatusCounts::default(),
    }
}

fn optional_counts(props: &LocationProperties) -> Option<StatusCounts> {
    let carries_status = props.status.is_some()
        || props.ok_count.is_some()
        || props.problem_count.is_some()
        || props.critical_count.is_some()
        || props.unknown_count.is_some()
        || props.deactivated_count.is_some();
    carries_status.then(|| counts_from_properties(props))
}

// ── Live events ─────────────────────────────────────────────────────

impl TryFrom<&LocationEvent> for LocationUpdate {
    type Error = CoreError;

    fn try_from(event: &LocationEvent) -> Result<Self, Self::Error> {
        let id = EntityId::from_json(&event.id)
            .ok_or_else(|| CoreError::shape("location event", event.id.to_string(), "no usable id"))?;

        let position = match &event.geometry {
            Some(geometry) if geometry.kind.as_deref().is_none_or(|k| k == "Point") => {
                Some(point_from_pair(&geometry.coordinates).ok_or_else(|| {
                    CoreError::shape("location event", id.to_string(), "invalid point coordinates")
                })?)
            }
            Some(_) => {
                return Err(CoreError::shape(
                    "location event",
                    id.to_string(),
                    "only point geometries can be moved",
                ));
            }
            None => None,
        };

        let revision = event
            .sequence
            .map(Revision::Sequence)
            .or(event.timestamp.map(Revision::Timestamp));

        Ok(LocationUpdate {
            id,
            position,
            counts: event.properties.as_ref().and_then(optional_counts),
            revision,
        })
    }
}

// ── Roster ──────────────────────────────────────────────────────────

impl From<RosterDevice> for Device {
    fn from(raw: RosterDevice) -> Self {
        let (status, status_label) = match raw.monitoring {
            Some(m) => {
                let status = Status::parse_lenient(&m.status);
                let label = m
                    .status_label
                    .filter(|l| !l.trim().is_empty())
                    .unwrap_or_else(|| status.to_string());
                (status, label)
            }
            None => (Status::Unknown, Status::Unknown.to_string()),
        };
        let id = EntityId::from_json(&raw.id).unwrap_or_else(|| EntityId::from(raw.name.as_str()));
        Self {
            id,
            name: raw.name,
            mac: raw.mac_address.filter(|m| !m.is_empty()).map(MacAddress::new),
            status,
            status_label,
            admin_url: raw.admin_edit_url,
        }
    }
}

impl From<RosterResponse> for RosterPage {
    fn from(raw: RosterResponse) -> Self {
        Self {
            count: raw.count,
            next: raw.next,
            previous: raw.previous,
            has_floorplan: raw.has_floorplan,
            devices: raw.results.into_iter().map(Device::from).collect(),
        }
    }
}

// ── Indoor floorplan ────────────────────────────────────────────────

/// Normalized floorplan page plus the devices that could not be placed.
pub fn floorplan_page(raw: FloorPlanResponse) -> (FloorPlanPage, Vec<CoreError>) {
    let mut out = Converted::default();
    for device in raw.results {
        out.push(placement_from_indoor(device));
    }
    (
        FloorPlanPage {
            floors: raw.floors,
            next: raw.next,
            placements: out.items,
        },
        out.skipped,
    )
}

fn placement_from_indoor(raw: IndoorDevice) -> Result<IndoorPlacement, CoreError> {
    let name = raw
        .device_name
        .clone()
        .or_else(|| raw.mac_address.clone())
        .unwrap_or_default();
    let device_id = raw
        .device_id
        .as_ref()
        .and_then(EntityId::from_json)
        .or_else(|| raw.mac_address.as_deref().map(EntityId::from))
        .ok_or_else(|| CoreError::shape("indoor device", name.clone(), "no device id"))?;

    let point = raw
        .coordinates
        .as_ref()
        .and_then(planar_from_value)
        .ok_or_else(|| CoreError::shape("indoor device", device_id.to_string(), "invalid indoor coordinates"))?;

    let status = raw
        .monitoring
        .as_ref()
        .map(|m| m.status.as_str())
        .or(raw.status.as_deref())
        .map_or(Status::Unknown, Status::parse_lenient);

    Ok(IndoorPlacement {
        name: if name.is_empty() { device_id.to_string() } else { name },
        device_id,
        floor: raw.floor,
        floor_name: raw.floor_name,
        image: raw.image.filter(|i| !i.is_empty()),
        point,
        status,
    })
}

/// `{x, y}`, or the map-style `{lng, lat}` where `lng` is x and `lat` is y.
fn planar_from_value(value: &Value) -> Option<PlanarPoint> {
    let obj = value.as_object()?;
    let x = obj.get("x").or_else(|| obj.get("lng"))?.as_f64()?;
    let y = obj.get("y").or_else(|| obj.get("lat"))?.as_f64()?;
    (x.is_finite() && y.is_finite()).then_some(PlanarPoint::new(x, y))
}
