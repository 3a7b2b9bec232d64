// ── Roster devices ──

use serde::{Deserialize, Serialize};

use super::entity_id::{EntityId, MacAddress};
use super::status::Status;

/// One row of a location's device roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: EntityId,
    pub name: String,
    pub mac: Option<MacAddress>,
    pub status: Status,
    /// Human label for the status as the server words it.
    pub status_label: String,
    /// Link to the device in the admin UI, when the server provides one.
    pub admin_url: Option<String>,
}

/// One page of a roster listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterPage {
    /// Total matching devices across all pages.
    pub count: u64,
    /// Opaque cursor for the next page.
    pub next: Option<String>,
    pub previous: Option<String>,
    pub has_floorplan: bool,
    pub devices: Vec<Device>,
}
