// fleetmap-api: Async Rust client for the monitoring geo, roster and floorplan APIs

pub mod client;
pub mod error;
pub mod models;
pub mod transport;
pub mod websocket;

pub use client::{MonitoringClient, RosterQuery};
pub use error::Error;
pub use models::{
    DeviceMonitoring, FloorPlanResponse, GeoCollection, GeoFeature, Geometry, IndoorDevice,
    LocationEvent, LocationProperties, NetNode, NodeLocation, RosterDevice, RosterResponse,
};
pub use transport::{TlsMode, TransportConfig};
