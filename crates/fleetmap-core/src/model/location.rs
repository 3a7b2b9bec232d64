// ── Locations ──
//
// A location is a named place carrying a device population. It is drawn
// as one marker coloured by the status its counters resolve to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity_id::EntityId;
use super::status::{Status, StatusCounts};

// ── Coordinates ─────────────────────────────────────────────────────

/// Geographic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite, latitude within ±90 and longitude within ±180.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Same point with the longitude moved by `delta` degrees.
    pub fn shifted(self, delta: f64) -> Self {
        Self {
            lat: self.lat,
            lng: self.lng + delta,
        }
    }
}

/// Raw indoor coordinate, relative to the centre of a floor image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanarPoint {
    pub x: f64,
    pub y: f64,
}

impl PlanarPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Where a location sits: on the world map, or on a floor image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Position {
    Geo(GeoPoint),
    Indoor(PlanarPoint),
}

// ── Revision ────────────────────────────────────────────────────────

/// Ordering key carried by a live update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Revision {
    Sequence(u64),
    Timestamp(DateTime<Utc>),
}

impl Revision {
    /// Whether `self` supersedes `applied`.
    ///
    /// Revisions of different kinds cannot be ordered; the newer arrival
    /// wins in that case.
    pub fn supersedes(&self, applied: &Revision) -> bool {
        match (self, applied) {
            (Self::Sequence(a), Self::Sequence(b)) => a > b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a > b,
            _ => true,
        }
    }
}

/// Last applied revision per field group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Revisions {
    pub position: Option<Revision>,
    pub status: Option<Revision>,
}

// ── DeviceLocation ──────────────────────────────────────────────────

/// A location with its device population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceLocation {
    pub id: EntityId,
    pub name: String,
    /// `None` when the feed carried no usable geometry. Such locations
    /// stay addressable but are never drawn.
    pub position: Option<Position>,
    pub counts: StatusCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<i32>,
    #[serde(skip)]
    pub revisions: Revisions,
}

impl DeviceLocation {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            position: None,
            counts: StatusCounts::default(),
            floor: None,
            revisions: Revisions::default(),
        }
    }

    pub fn with_point(mut self, point: GeoPoint) -> Self {
        self.position = Some(Position::Geo(point));
        self
    }

    pub fn with_counts(mut self, counts: StatusCounts) -> Self {
        self.counts = counts;
        self
    }

    /// Resolved status. Always derived from the counters, never stored.
    pub fn status(&self) -> Status {
        self.counts.resolve()
    }

    pub fn device_count(&self) -> u64 {
        self.counts.total()
    }

    pub fn geo(&self) -> Option<GeoPoint> {
        match self.position {
            Some(Position::Geo(point)) => Some(point),
            _ => None,
        }
    }

    pub fn planar(&self) -> Option<PlanarPoint> {
        match self.position {
            Some(Position::Indoor(point)) => Some(point),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_follows_counts() {
        let mut loc = DeviceLocation::new(EntityId::from("a"), "Rome")
            .with_counts(StatusCounts::single(Status::Ok, 3));
        assert_eq!(loc.status(), Status::Ok);

        loc.counts.critical = 4;
        assert_eq!(loc.status(), Status::Critical);
        assert_eq!(loc.device_count(), 7);
    }

    #[test]
    fn point_validation() {
        assert!(GeoPoint::new(41.9, 12.5).is_valid());
        assert!(GeoPoint::new(0.0, 180.0).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, f64::NAN).is_valid());
    }

    #[test]
    fn sequence_revisions_order_strictly() {
        let applied = Revision::Sequence(5);
        assert!(Revision::Sequence(6).supersedes(&applied));
        assert!(!Revision::Sequence(5).supersedes(&applied));
        assert!(!Revision::Sequence(4).supersedes(&applied));
    }

    #[test]
    fn timestamp_revisions_order_strictly() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().unwrap_or_default();
        let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 1).single().unwrap_or_default();
        assert!(Revision::Timestamp(t1).supersedes(&Revision::Timestamp(t0)));
        assert!(!Revision::Timestamp(t0).supersedes(&Revision::Timestamp(t1)));
    }
}
