// ── Indoor floors ──

use serde::{Deserialize, Serialize};

use super::entity_id::EntityId;
use super::location::PlanarPoint;
use super::status::Status;

/// A device placed on a floor image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndoorPlacement {
    pub device_id: EntityId,
    pub name: String,
    pub floor: i32,
    pub floor_name: Option<String>,
    /// Floor image reference (URL or path).
    pub image: Option<String>,
    pub point: PlanarPoint,
    pub status: Status,
}

/// One page of the indoor-coordinates endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloorPlanPage {
    /// Every floor level of the location, as the server lists them.
    pub floors: Vec<i32>,
    pub next: Option<String>,
    pub placements: Vec<IndoorPlacement>,
}

/// Everything known about one floor, accumulated across pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Floor {
    pub level: i32,
    pub name: Option<String>,
    pub image: Option<String>,
    pub placements: Vec<IndoorPlacement>,
}

impl Floor {
    pub fn new(level: i32) -> Self {
        Self {
            level,
            name: None,
            image: None,
            placements: Vec::new(),
        }
    }

    /// Add a placement, adopting its floor name and image if this floor
    /// has none yet.
    pub fn push(&mut self, placement: IndoorPlacement) {
        if self.name.is_none() {
            self.name.clone_from(&placement.floor_name);
        }
        if self.image.is_none() {
            self.image.clone_from(&placement.image);
        }
        self.placements.push(placement);
    }

    /// Heading shown above the floor image.
    pub fn heading(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("Floor {}", self.level),
        }
    }
}
