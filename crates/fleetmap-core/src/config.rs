// ── Runtime configuration ──
//
// These types describe how to reach the monitoring server and how the
// map behaves. They never touch disk: the CLI builds them (usually via
// fleetmap-config) and hands them in.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use fleetmap_api::{MonitoringClient, TlsMode, TransportConfig};

use crate::error::CoreError;
use crate::model::{GeoPoint, StatusPalette};

// ── Server connection ───────────────────────────────────────────────

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed certs).
    DangerAcceptInvalid,
}

/// How to reach one monitoring server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server root, e.g. `https://monitor.example.com/`.
    pub url: Url,
    /// API token, sent as a bearer token.
    pub token: Option<SecretString>,
    pub tls: TlsVerification,
    pub timeout: Duration,
    /// Subscribe to live location updates.
    pub websocket_enabled: bool,
}

impl ServerConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            token: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            websocket_enabled: true,
        }
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
            token: self.token.clone(),
        }
    }

    /// Build an HTTP client for this server.
    pub fn client(&self) -> Result<MonitoringClient, CoreError> {
        Ok(MonitoringClient::new(self.url.clone(), &self.transport())?)
    }
}

// ── Viewer behaviour ────────────────────────────────────────────────

/// Roster popup timings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Delay between the last search keystroke and the fetch.
    #[serde(with = "millis")]
    pub search_debounce: Duration,
    /// Delay after a status filter toggle. Zero fires immediately.
    #[serde(with = "millis")]
    pub status_debounce: Duration,
    /// Delay after a scroll reaches the bottom.
    #[serde(with = "millis")]
    pub scroll_debounce: Duration,
    /// How close to the bottom (px) counts as "at the bottom".
    pub scroll_threshold_px: f64,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            search_debounce: Duration::from_millis(300),
            status_debounce: Duration::ZERO,
            scroll_debounce: Duration::from_millis(100),
            scroll_threshold_px: 10.0,
        }
    }
}

/// Indoor floor viewer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorConfig {
    /// Number of floor buttons visible at once.
    pub window_size: usize,
    /// Highest zoom of the floor map; images are placed one level below.
    pub max_zoom: i32,
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            max_zoom: 2,
        }
    }
}

/// Everything the map viewer needs besides a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub palette: StatusPalette,
    pub roster: RosterConfig,
    pub floors: FloorConfig,
    /// Stop following bulk-feed pages once this many locations are loaded.
    pub max_points_fetched: usize,
    /// View used when there is nothing to fit.
    pub default_center: GeoPoint,
    pub default_zoom: u8,
    /// Zoom used to center on a single location.
    pub single_location_zoom: u8,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            palette: StatusPalette::default(),
            roster: RosterConfig::default(),
            floors: FloorConfig::default(),
            max_points_fetched: 10_000,
            default_center: GeoPoint::new(55.78, 11.54),
            default_zoom: 1,
            single_location_zoom: 10,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
