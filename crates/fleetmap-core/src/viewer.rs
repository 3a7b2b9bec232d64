// ── Map viewer ──
//
// Per-session controller behind the device map. Owns the location store,
// the world-copy flags, the popup and its roster, and drives a
// `MapSurface`. Every surface-facing event of a map session enters here.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::antimeridian::{AntimeridianWrapper, ViewportBounds, WrapOutcome};
use crate::config::ViewerConfig;
use crate::error::CoreError;
use crate::live::{self, AppliedUpdate, FieldChange, LocationUpdate};
use crate::model::{DeviceLocation, EntityId, GeoPoint};
use crate::popup::PopupState;
use crate::render::MapSurface;
use crate::roster::{RosterOutcome, RosterPaginator};
use crate::source::{LocationSource, RosterSource};
use crate::store::LocationStore;

/// Result of a bulk load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub locations: usize,
    pub skipped: usize,
    pub pages: usize,
    /// Stopped at the point limit with pages left.
    pub truncated: bool,
}

/// Where the map starts once it is ready.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InitialView {
    Center { point: GeoPoint, zoom: u8 },
    Fit { bounds: ViewportBounds },
}

/// Device map session.
pub struct MapViewer<S, M> {
    config: ViewerConfig,
    source: Arc<S>,
    surface: M,
    store: Arc<LocationStore>,
    wrapper: AntimeridianWrapper,
    popup: PopupState,
    roster: Option<Arc<RosterPaginator<S>>>,
}

impl<S, M> MapViewer<S, M>
where
    S: LocationSource + RosterSource,
    M: MapSurface + Send,
{
    pub fn new(source: Arc<S>, surface: M, config: ViewerConfig) -> Self {
        Self {
            config,
            source,
            surface,
            store: Arc::new(LocationStore::new()),
            wrapper: AntimeridianWrapper::new(),
            popup: PopupState::default(),
            roster: None,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<LocationStore> {
        &self.store
    }

    pub fn surface(&self) -> &M {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut M {
        &mut self.surface
    }

    pub fn popup(&self) -> &PopupState {
        &self.popup
    }

    /// Roster of the open (or opening) popup.
    pub fn roster(&self) -> Option<&Arc<RosterPaginator<S>>> {
        self.roster.as_ref()
    }

    pub fn wrapper(&self) -> &AntimeridianWrapper {
        &self.wrapper
    }

    // ── Dataset ──────────────────────────────────────────────────────

    /// Fetch the bulk feed, following `next` until it runs out or the
    /// point limit is reached, then replace the dataset and redraw.
    ///
    /// On failure the previous dataset stays and the user is alerted.
    pub async fn load(&mut self) -> Result<LoadSummary, CoreError> {
        let limit = self.config.max_points_fetched;
        let mut summary = LoadSummary::default();
        let mut locations: Vec<DeviceLocation> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = match self.source.locations_page(cursor.as_deref()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, pages = summary.pages, "bulk load failed");
                    self.surface.alert(&e.user_message());
                    return Err(e);
                }
            };
            summary.pages += 1;
            summary.skipped += page.skipped.len();
            locations.extend(page.locations);

            match page.next {
                Some(next) if locations.len() < limit => cursor = Some(next),
                Some(_) => {
                    summary.truncated = true;
                    break;
                }
                None => break,
            }
        }

        locations.truncate(limit);
        summary.locations = locations.len();

        self.close_popup();
        self.store.replace_all(locations);
        self.wrapper.rearm();
        info!(
            locations = summary.locations,
            skipped = summary.skipped,
            pages = summary.pages,
            truncated = summary.truncated,
            "locations loaded"
        );
        self.render();
        Ok(summary)
    }

    /// Redraw every marker, ghosts included.
    pub fn render(&mut self) {
        let features = self.store.render_features(&self.config.palette);
        self.surface.render(&features);
    }

    // ── Surface events ───────────────────────────────────────────────

    /// Initial view: centre on a lone location, fit several, or fall
    /// back to the configured default.
    pub fn on_ready(&self) -> InitialView {
        let snapshot = self.store.locations_snapshot();
        let points: Vec<GeoPoint> = snapshot.iter().filter_map(|l| l.geo()).collect();

        match points.as_slice() {
            [] => InitialView::Center {
                point: self.config.default_center,
                zoom: self.config.default_zoom,
            },
            [only] => InitialView::Center {
                point: *only,
                zoom: self.config.single_location_zoom,
            },
            [first, rest @ ..] => {
                let mut bounds = ViewportBounds {
                    south: first.lat,
                    west: first.lng,
                    north: first.lat,
                    east: first.lng,
                };
                for p in rest {
                    bounds.south = bounds.south.min(p.lat);
                    bounds.north = bounds.north.max(p.lat);
                    bounds.west = bounds.west.min(p.lng);
                    bounds.east = bounds.east.max(p.lng);
                }
                InitialView::Fit { bounds }
            }
        }
    }

    /// Pan/zoom. Appends world copies as they come into view.
    pub fn on_viewport_change(&mut self, bounds: &ViewportBounds) -> WrapOutcome {
        let outcome = self.wrapper.on_viewport_change(bounds, &self.store);
        if outcome.changed() {
            self.render();
        }
        outcome
    }

    /// Marker click: open the popup once the first roster page is in.
    ///
    /// Holds the viewer for the whole first fetch. A session that must
    /// keep applying live events meanwhile uses
    /// [`begin_click`](Self::begin_click) and
    /// [`finish_click`](Self::finish_click) instead.
    pub async fn on_feature_click(&mut self, id: &EntityId) -> Result<RosterOutcome, CoreError> {
        let roster = self.begin_click(id)?;
        let result = roster.open().await;
        self.finish_click(id, result)
    }

    /// First half of a click: close whatever popup was open, put the
    /// popup in `Loading` and hand back the new roster. The caller runs
    /// [`RosterPaginator::open`] and passes the result to
    /// [`finish_click`](Self::finish_click).
    ///
    /// A location without coordinates cannot anchor a popup and is
    /// rejected without a roster.
    pub fn begin_click(&mut self, id: &EntityId) -> Result<Arc<RosterPaginator<S>>, CoreError> {
        self.close_popup();
        self.popup.begin(id.clone());

        let Some(location) = self.store.location(id) else {
            self.popup.fail(id);
            return Err(CoreError::LocationNotFound {
                identifier: id.to_string(),
            });
        };
        if location.geo().is_none() {
            self.popup.fail(id);
            return Err(CoreError::shape("location", id.to_string(), "no coordinates"));
        }

        let roster = Arc::new(RosterPaginator::new(
            id.clone(),
            Arc::clone(&self.source),
            self.config.roster,
        ));
        self.roster = Some(Arc::clone(&roster));
        Ok(roster)
    }

    /// Second half of a click. Opens the popup at the location's current
    /// position if it is still loading for `id`; a result for a popup
    /// that was closed or replaced meanwhile changes nothing.
    pub fn finish_click(
        &mut self,
        id: &EntityId,
        result: Result<RosterOutcome, CoreError>,
    ) -> Result<RosterOutcome, CoreError> {
        let waiting = matches!(&self.popup, PopupState::Loading { location } if location == id);
        if !waiting {
            debug!(location = %id, "popup moved on, ignoring roster result");
            return result;
        }

        let anchor = self.store.location(id).and_then(|loc| loc.geo());
        match (result, anchor) {
            (Ok(outcome), Some(anchor)) => {
                self.popup.open(id, anchor);
                self.surface.show_popup(anchor);
                debug!(location = %id, ?outcome, "popup opened");
                Ok(outcome)
            }
            (Ok(_), None) => {
                self.drop_pending(id);
                Err(CoreError::LocationNotFound {
                    identifier: id.to_string(),
                })
            }
            (Err(e), _) => {
                warn!(location = %id, error = %e, "roster fetch failed");
                self.surface.alert(&e.user_message());
                self.drop_pending(id);
                Err(e)
            }
        }
    }

    fn drop_pending(&mut self, id: &EntityId) {
        self.popup.fail(id);
        if let Some(roster) = self.roster.take() {
            roster.close();
        }
    }

    /// Close the popup and silence its roster.
    pub fn close_popup(&mut self) {
        if let Some(roster) = self.roster.take() {
            roster.close();
        }
        if self.popup.location().is_some() {
            self.popup.close();
            self.surface.hide_popup();
        }
    }

    // ── Live updates ─────────────────────────────────────────────────

    /// Apply one live event. Moves go straight to the surface; a status
    /// change redraws so colours follow.
    pub fn apply_update(&mut self, update: &LocationUpdate) -> Option<AppliedUpdate> {
        let applied = live::apply_update(&self.store, update)?;

        if applied.moved() {
            if let Some(to) = update.position {
                live::move_marker(&mut self.surface, &mut self.popup, &update.id, to);
            }
        }
        if applied.status == FieldChange::Applied {
            self.render();
        }
        Some(applied)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use tokio::sync::Notify;

    use super::*;
    use crate::antimeridian::WorldCopy;
    use crate::convert::LocationPage;
    use crate::model::{Device, RosterPage, Status, StatusCounts};
    use crate::render::testing::{RecordingSurface, SurfaceCall};
    use crate::roster::RosterFilter;
    use pretty_assertions::assert_eq;

    /// Bulk feed split over pages `"1"`, `"2"`, ...; roster of one device.
    #[derive(Default)]
    struct FakeSource {
        pages: Vec<Vec<DeviceLocation>>,
        cursors: Mutex<Vec<Option<String>>>,
        fail_bulk: AtomicBool,
        fail_roster: AtomicBool,
        hold_roster: AtomicBool,
        release_roster: Notify,
    }

    fn loc(id: &str, lat: f64, lng: f64) -> DeviceLocation {
        DeviceLocation::new(EntityId::from(id), id.to_uppercase())
            .with_point(GeoPoint::new(lat, lng))
            .with_counts(StatusCounts::single(Status::Ok, 1))
    }

    impl FakeSource {
        fn with_pages(pages: Vec<Vec<DeviceLocation>>) -> Self {
            Self {
                pages,
                ..Self::default()
            }
        }

        fn fail() -> CoreError {
            CoreError::FetchFailed {
                message: "boom".into(),
                status: Some(502),
            }
        }
    }

    impl LocationSource for FakeSource {
        async fn locations_page(&self, cursor: Option<&str>) -> Result<LocationPage, CoreError> {
            self.cursors.lock().unwrap().push(cursor.map(str::to_owned));
            if self.fail_bulk.load(Ordering::SeqCst) {
                return Err(Self::fail());
            }
            let index: usize = cursor.map_or(0, |c| c.parse().unwrap());
            let next = index + 1;
            Ok(LocationPage {
                locations: self.pages[index].clone(),
                skipped: Vec::new(),
                next: (next < self.pages.len()).then(|| next.to_string()),
            })
        }
    }

    impl RosterSource for FakeSource {
        async fn first_page(
            &self,
            _location: &EntityId,
            _filter: &RosterFilter,
        ) -> Result<RosterPage, CoreError> {
            if self.hold_roster.load(Ordering::SeqCst) {
                self.release_roster.notified().await;
            }
            if self.fail_roster.load(Ordering::SeqCst) {
                return Err(Self::fail());
            }
            Ok(RosterPage {
                count: 1,
                devices: vec![Device {
                    id: EntityId::from("dev-1"),
                    name: "ap-01".into(),
                    mac: None,
                    status: Status::Ok,
                    status_label: "ok".into(),
                    admin_url: None,
                }],
                ..RosterPage::default()
            })
        }

        async fn next_page(&self, _cursor: &str) -> Result<RosterPage, CoreError> {
            Ok(RosterPage::default())
        }
    }

    type Viewer = MapViewer<FakeSource, RecordingSurface>;

    fn viewer(source: FakeSource) -> Viewer {
        MapViewer::new(
            Arc::new(source),
            RecordingSurface::default(),
            ViewerConfig::default(),
        )
    }

    async fn loaded(locations: Vec<DeviceLocation>) -> Viewer {
        let mut viewer = viewer(FakeSource::with_pages(vec![locations]));
        viewer.load().await.unwrap();
        viewer.surface_mut().calls.clear();
        viewer
    }

    #[tokio::test]
    async fn load_follows_pages_and_renders() {
        let source = FakeSource::with_pages(vec![
            vec![loc("a", 1.0, 1.0), loc("b", 2.0, 2.0)],
            vec![loc("c", 3.0, 3.0)],
        ]);
        let mut viewer = viewer(source);

        let summary = viewer.load().await.unwrap();

        assert_eq!(summary.locations, 3);
        assert_eq!(summary.pages, 2);
        assert!(!summary.truncated);
        assert_eq!(viewer.surface().calls, vec![SurfaceCall::Render(3)]);
        assert_eq!(viewer.store().location_count(), 3);
    }

    #[tokio::test]
    async fn load_stops_at_point_limit() {
        let source = FakeSource::with_pages(vec![
            vec![loc("a", 1.0, 1.0), loc("b", 2.0, 2.0)],
            vec![loc("c", 3.0, 3.0), loc("d", 4.0, 4.0)],
            vec![loc("e", 5.0, 5.0)],
        ]);
        let mut viewer = MapViewer::new(
            Arc::new(source),
            RecordingSurface::default(),
            ViewerConfig {
                max_points_fetched: 3,
                ..ViewerConfig::default()
            },
        );

        let summary = viewer.load().await.unwrap();

        assert_eq!(summary.locations, 3);
        assert_eq!(summary.pages, 2);
        assert!(summary.truncated);
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_data_and_alerts() {
        let mut viewer = loaded(vec![loc("a", 1.0, 1.0)]).await;
        viewer.source.fail_bulk.store(true, Ordering::SeqCst);

        let err = viewer.load().await.unwrap_err();

        assert!(matches!(err, CoreError::FetchFailed { .. }));
        assert_eq!(viewer.store().location_count(), 1);
        assert_eq!(
            viewer.surface().calls,
            vec![SurfaceCall::Alert(
                "Could not load data from the server (HTTP 502)".into()
            )]
        );
    }

    #[tokio::test]
    async fn reload_rearms_world_copies() {
        let mut viewer = loaded(vec![loc("a", 1.0, 170.0)]).await;
        let east = ViewportBounds {
            south: -10.0,
            west: 100.0,
            north: 10.0,
            east: 200.0,
        };
        assert_eq!(viewer.on_viewport_change(&east).east, Some(1));
        assert_eq!(viewer.surface().calls, vec![SurfaceCall::Render(2)]);
        assert_eq!(viewer.on_viewport_change(&east).east, None);

        viewer.load().await.unwrap();
        assert!(!viewer.wrapper().is_appended(WorldCopy::East));
        assert_eq!(viewer.store().ghosts_snapshot().len(), 0);
    }

    #[tokio::test]
    async fn initial_view_depends_on_location_count() {
        let empty = loaded(Vec::new()).await;
        assert_eq!(
            empty.on_ready(),
            InitialView::Center {
                point: GeoPoint::new(55.78, 11.54),
                zoom: 1
            }
        );

        let single = loaded(vec![loc("a", 41.9, 12.5)]).await;
        assert_eq!(
            single.on_ready(),
            InitialView::Center {
                point: GeoPoint::new(41.9, 12.5),
                zoom: 10
            }
        );

        let several = loaded(vec![loc("a", 41.9, 12.5), loc("b", 59.9, 10.7)]).await;
        assert_eq!(
            several.on_ready(),
            InitialView::Fit {
                bounds: ViewportBounds {
                    south: 41.9,
                    west: 10.7,
                    north: 59.9,
                    east: 12.5
                }
            }
        );
    }

    #[tokio::test]
    async fn click_opens_popup_at_location() {
        let mut viewer = loaded(vec![loc("a", 41.9, 12.5)]).await;
        let a = EntityId::from("a");

        let outcome = viewer.on_feature_click(&a).await.unwrap();

        assert_eq!(outcome, RosterOutcome::Replaced { count: 1, rows: 1 });
        assert!(viewer.popup().is_open_for(&a));
        assert_eq!(viewer.roster().unwrap().devices().len(), 1);
        assert_eq!(
            viewer.surface().calls,
            vec![SurfaceCall::ShowPopup(GeoPoint::new(41.9, 12.5))]
        );
    }

    #[tokio::test]
    async fn click_without_coordinates_is_rejected() {
        let unplaced = DeviceLocation::new(EntityId::from("u"), "Nowhere");
        let mut viewer = loaded(vec![unplaced]).await;

        let err = viewer.on_feature_click(&EntityId::from("u")).await.unwrap_err();

        assert!(matches!(err, CoreError::DataShapeMismatch { .. }));
        assert_eq!(viewer.popup(), &PopupState::Closed);
        assert!(viewer.roster().is_none());
    }

    #[tokio::test]
    async fn roster_failure_alerts_and_closes() {
        let mut viewer = loaded(vec![loc("a", 41.9, 12.5)]).await;
        viewer.source.fail_roster.store(true, Ordering::SeqCst);

        let err = viewer.on_feature_click(&EntityId::from("a")).await.unwrap_err();

        assert!(matches!(err, CoreError::FetchFailed { .. }));
        assert_eq!(viewer.popup(), &PopupState::Closed);
        assert!(viewer.roster().is_none());
        assert_eq!(
            viewer.surface().calls,
            vec![SurfaceCall::Alert(
                "Could not load data from the server (HTTP 502)".into()
            )]
        );
    }

    #[tokio::test]
    async fn second_click_closes_first_roster() {
        let mut viewer = loaded(vec![loc("a", 1.0, 1.0), loc("b", 2.0, 2.0)]).await;
        viewer.on_feature_click(&EntityId::from("a")).await.unwrap();
        let first = Arc::clone(viewer.roster().unwrap());

        viewer.on_feature_click(&EntityId::from("b")).await.unwrap();

        assert!(first.is_closed());
        assert!(viewer.popup().is_open_for(&EntityId::from("b")));
    }

    #[tokio::test]
    async fn live_updates_and_close_while_popup_loads() {
        let mut viewer = loaded(vec![loc("a", 41.9, 12.5)]).await;
        viewer.source.hold_roster.store(true, Ordering::SeqCst);
        let a = EntityId::from("a");

        let roster = viewer.begin_click(&a).unwrap();
        assert_eq!(viewer.popup(), &PopupState::Loading { location: a.clone() });
        let opening = tokio::spawn({
            let roster = Arc::clone(&roster);
            async move { roster.open().await }
        });
        tokio::task::yield_now().await;
        assert!(roster.is_loading());

        let to = GeoPoint::new(45.0, 9.2);
        let applied = viewer.apply_update(&LocationUpdate::moved(a.clone(), to)).unwrap();
        assert!(applied.moved());
        assert_eq!(viewer.surface().calls, vec![SurfaceCall::MoveMarker(a.clone(), to)]);

        viewer.close_popup();
        viewer.source.release_roster.notify_one();
        let result = opening.await.unwrap();
        assert_eq!(result.as_ref().unwrap(), &RosterOutcome::Discarded);

        viewer.surface_mut().calls.clear();
        assert_eq!(viewer.finish_click(&a, result).unwrap(), RosterOutcome::Discarded);
        assert_eq!(viewer.popup(), &PopupState::Closed);
        assert!(viewer.surface().calls.is_empty());
    }

    #[tokio::test]
    async fn popup_opens_where_the_location_moved_while_loading() {
        let mut viewer = loaded(vec![loc("a", 41.9, 12.5)]).await;
        viewer.source.hold_roster.store(true, Ordering::SeqCst);
        let a = EntityId::from("a");

        let roster = viewer.begin_click(&a).unwrap();
        let opening = tokio::spawn({
            let roster = Arc::clone(&roster);
            async move { roster.open().await }
        });
        tokio::task::yield_now().await;

        let to = GeoPoint::new(45.0, 9.2);
        viewer.apply_update(&LocationUpdate::moved(a.clone(), to)).unwrap();
        viewer.surface_mut().calls.clear();

        viewer.source.release_roster.notify_one();
        let result = opening.await.unwrap();
        viewer.finish_click(&a, result).unwrap();

        assert_eq!(viewer.popup(), &PopupState::Open { location: a, anchor: to });
        assert_eq!(viewer.surface().calls, vec![SurfaceCall::ShowPopup(to)]);
    }

    #[tokio::test]
    async fn live_move_drags_open_popup() {
        let mut viewer = loaded(vec![loc("a", 41.9, 12.5)]).await;
        let a = EntityId::from("a");
        viewer.on_feature_click(&a).await.unwrap();
        viewer.surface_mut().calls.clear();

        let to = GeoPoint::new(45.0, 9.2);
        let applied = viewer.apply_update(&LocationUpdate::moved(a.clone(), to)).unwrap();

        assert!(applied.moved());
        assert_eq!(
            viewer.surface().calls,
            vec![
                SurfaceCall::HidePopup,
                SurfaceCall::MoveMarker(a.clone(), to),
                SurfaceCall::ShowPopup(to),
            ]
        );
        assert_eq!(viewer.popup(), &PopupState::Open { location: a, anchor: to });
    }

    #[tokio::test]
    async fn live_status_change_recolours() {
        let mut viewer = loaded(vec![loc("a", 41.9, 12.5)]).await;
        let update = LocationUpdate {
            id: EntityId::from("a"),
            position: None,
            counts: Some(StatusCounts::single(Status::Critical, 1)),
            revision: None,
        };

        viewer.apply_update(&update).unwrap();

        assert_eq!(viewer.surface().calls, vec![SurfaceCall::Render(1)]);
        assert_eq!(viewer.surface().last_render[0].color, "#a72d1d");
    }
}
