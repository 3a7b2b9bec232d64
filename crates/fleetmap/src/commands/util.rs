//! Shared helpers for command handlers.

use std::sync::Arc;

use tracing::{trace, warn};

use fleetmap_api::MonitoringClient;
use fleetmap_config::Config;
use fleetmap_core::{
    EntityId, GeoPoint, LoadSummary, MapSurface, MapViewer, RenderFeature, ViewerConfig,
};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

/// Everything a server-bound command needs.
pub struct Context {
    pub client: Arc<MonitoringClient>,
    pub viewer: ViewerConfig,
    pub color: bool,
    pub server_url: String,
    pub websocket_enabled: bool,
}

impl Context {
    pub fn new(global: &GlobalOpts, cfg: Config) -> Result<Self, CliError> {
        let server = config::resolve_server_config(global, &cfg)?;
        let client = server.client()?;
        Ok(Self {
            client: Arc::new(client),
            viewer: cfg.viewer,
            color: output::should_color(&global.color),
            server_url: server.url.to_string(),
            websocket_enabled: server.websocket_enabled,
        })
    }

    /// A map viewer over this server, drawing into a [`TerminalSurface`].
    pub fn map_viewer(&self) -> MapViewer<MonitoringClient, TerminalSurface> {
        MapViewer::new(
            Arc::clone(&self.client),
            TerminalSurface::default(),
            self.viewer.clone(),
        )
    }

    /// Load every location behind a spinner.
    pub async fn load(
        &self,
        viewer: &mut MapViewer<MonitoringClient, TerminalSurface>,
        quiet: bool,
    ) -> Result<LoadSummary, CliError> {
        let spinner = output::spinner(&format!("Loading locations from {}", self.server_url), quiet);
        let result = viewer.load().await;
        spinner.finish_and_clear();
        result.map_err(|e| self.fetch_error(e))
    }

    /// Attach the server URL to a fetch failure.
    pub fn fetch_error(&self, err: fleetmap_core::CoreError) -> CliError {
        match CliError::from(err) {
            CliError::FetchFailed { reason, .. } => CliError::FetchFailed {
                url: self.server_url.clone(),
                reason,
            },
            other => other,
        }
    }
}

// ── Terminal surface ────────────────────────────────────────────────

/// `MapSurface` for a terminal: keeps the last drawn markers and logs
/// everything else. Alerts are logged only; the failing command reports
/// the error itself.
#[derive(Debug, Default)]
pub struct TerminalSurface {
    pub features: Vec<RenderFeature>,
    pub moves: Vec<(EntityId, GeoPoint)>,
}

impl TerminalSurface {
    /// Drain the marker moves seen since the last call.
    pub fn take_moves(&mut self) -> Vec<(EntityId, GeoPoint)> {
        std::mem::take(&mut self.moves)
    }
}

impl MapSurface for TerminalSurface {
    fn render(&mut self, features: &[RenderFeature]) {
        trace!(markers = features.len(), "render");
        self.features = features.to_vec();
    }

    fn move_marker(&mut self, id: &EntityId, to: GeoPoint) {
        self.moves.push((id.clone(), to));
    }

    fn hide_popup(&mut self) {}

    fn show_popup(&mut self, at: GeoPoint) {
        trace!(lat = at.lat, lng = at.lng, "popup");
    }

    fn alert(&mut self, message: &str) {
        warn!(%message, "alert");
    }
}

/// `12.3456, -7.8900`
pub fn format_point(p: GeoPoint) -> String {
    format!("{:.4}, {:.4}", p.lat, p.lng)
}
