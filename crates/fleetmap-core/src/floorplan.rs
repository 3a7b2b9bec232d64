// ── Floor plan session ──
//
// The indoor view of one location. Floors are fetched lazily, cached for
// the session and only ever extended. Showing a floor projects its
// devices onto the floor image.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::floors::FloorNavigator;
use crate::indoor::{ImageDimensions, IndoorProjector, OverlayBounds};
use crate::model::{EntityId, Floor, FloorPlanPage, GeoPoint, StatusPalette, Status};
use crate::source::{FloorImageLoader, FloorPlanSource};

/// An indoor device ready to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndoorMarker {
    pub device_id: EntityId,
    pub name: String,
    pub point: GeoPoint,
    pub status: Status,
    pub color: String,
}

/// A rendered floor: image overlay plus projected markers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloorView {
    pub level: i32,
    pub heading: String,
    pub image: String,
    pub image_size: ImageDimensions,
    pub bounds: OverlayBounds,
    pub markers: Vec<IndoorMarker>,
}

/// Indoor view session for one location.
pub struct FloorPlanSession<S> {
    location: EntityId,
    source: Arc<S>,
    projector: IndoorProjector,
    palette: StatusPalette,
    navigator: FloorNavigator,
    floors: BTreeMap<i32, Floor>,
}

impl<S: FloorPlanSource> FloorPlanSession<S> {
    /// Fetch the location's indoor coordinates and select the floor of
    /// the first device returned (else the top floor).
    pub async fn open(
        location: EntityId,
        source: Arc<S>,
        projector: IndoorProjector,
        palette: StatusPalette,
        window_size: usize,
    ) -> Result<Self, CoreError> {
        let pages = fetch_all(source.as_ref(), &location, None).await?;

        let mut levels: Vec<i32> = pages.iter().flat_map(|p| p.floors.iter().copied()).collect();
        let first_level = pages
            .iter()
            .flat_map(|p| p.placements.iter())
            .map(|p| p.floor)
            .next();

        let mut floors = BTreeMap::new();
        for placement in pages.into_iter().flat_map(|p| p.placements) {
            levels.push(placement.floor);
            floors
                .entry(placement.floor)
                .or_insert_with(|| Floor::new(placement.floor))
                .push(placement);
        }

        let mut navigator = FloorNavigator::new(levels, window_size);
        if let Some(level) = first_level {
            navigator.select_level(level);
        }
        debug!(
            location = %location,
            floors = navigator.floors().len(),
            selected = ?navigator.selected_level(),
            "floor plan opened"
        );

        Ok(Self {
            location,
            source,
            projector,
            palette,
            navigator,
            floors,
        })
    }

    pub fn location(&self) -> &EntityId {
        &self.location
    }

    pub fn navigator(&self) -> &FloorNavigator {
        &self.navigator
    }

    pub fn is_cached(&self, level: i32) -> bool {
        self.floors.contains_key(&level)
    }

    pub fn cached_floor(&self, level: i32) -> Option<&Floor> {
        self.floors.get(&level)
    }

    // ── Navigation ───────────────────────────────────────────────────

    /// Render the selected floor.
    pub async fn show_selected<L: FloorImageLoader>(
        &mut self,
        loader: &L,
    ) -> Result<FloorView, CoreError> {
        let level = self.selected_level()?;
        self.load_and_render(level, loader).await
    }

    /// Select `level` and render it, fetching it first if not cached.
    /// On failure the previous selection is kept.
    pub async fn show_floor<L: FloorImageLoader>(
        &mut self,
        level: i32,
        loader: &L,
    ) -> Result<FloorView, CoreError> {
        let previous = self.navigator.clone();
        if !self.navigator.select_level(level) {
            return Err(CoreError::FloorNotFound { level });
        }
        let result = self.load_and_render(level, loader).await;
        if result.is_err() {
            self.navigator = previous;
        }
        result
    }

    /// Up arrow. `None` when already on the top floor.
    pub async fn step_up<L: FloorImageLoader>(
        &mut self,
        loader: &L,
    ) -> Result<Option<FloorView>, CoreError> {
        self.step(FloorNavigator::step_up, loader).await
    }

    /// Down arrow. `None` when already on the bottom floor.
    pub async fn step_down<L: FloorImageLoader>(
        &mut self,
        loader: &L,
    ) -> Result<Option<FloorView>, CoreError> {
        self.step(FloorNavigator::step_down, loader).await
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn step<L: FloorImageLoader>(
        &mut self,
        step: fn(&mut FloorNavigator) -> bool,
        loader: &L,
    ) -> Result<Option<FloorView>, CoreError> {
        let previous = self.navigator.clone();
        if !step(&mut self.navigator) {
            return Ok(None);
        }
        let result = match self.selected_level() {
            Ok(level) => self.load_and_render(level, loader).await,
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.navigator = previous;
        }
        result.map(Some)
    }

    fn selected_level(&self) -> Result<i32, CoreError> {
        self.navigator
            .selected_level()
            .ok_or_else(|| CoreError::LocationNotFound {
                identifier: format!("{} (no floors)", self.location),
            })
    }

    async fn load_and_render<L: FloorImageLoader>(
        &mut self,
        level: i32,
        loader: &L,
    ) -> Result<FloorView, CoreError> {
        self.ensure_floor(level).await?;
        let floor = self
            .floors
            .get(&level)
            .ok_or(CoreError::FloorNotFound { level })?;
        self.render(floor, loader).await
    }

    async fn ensure_floor(&mut self, level: i32) -> Result<(), CoreError> {
        if self.floors.contains_key(&level) {
            return Ok(());
        }
        debug!(location = %self.location, level, "fetching floor");
        let pages = fetch_all(self.source.as_ref(), &self.location, Some(level)).await?;

        let mut floor = Floor::new(level);
        for placement in pages.into_iter().flat_map(|p| p.placements) {
            if placement.floor == level {
                floor.push(placement);
            } else {
                warn!(level, got = placement.floor, "device from another floor ignored");
            }
        }
        self.floors.insert(level, floor);
        Ok(())
    }

    async fn render<L: FloorImageLoader>(
        &self,
        floor: &Floor,
        loader: &L,
    ) -> Result<FloorView, CoreError> {
        let level = floor.level;
        let image = floor.image.clone().ok_or_else(|| CoreError::ProjectionFailed {
            level,
            reason: "floor has no image".into(),
        })?;
        let image_size = loader.dimensions(&image).await.map_err(|e| match e {
            CoreError::ProjectionFailed { .. } => e,
            other => CoreError::ProjectionFailed {
                level,
                reason: other.to_string(),
            },
        })?;

        let bounds = self.projector.overlay_bounds(level, image_size)?;
        let markers = floor
            .placements
            .iter()
            .map(|p| {
                Ok(IndoorMarker {
                    device_id: p.device_id.clone(),
                    name: p.name.clone(),
                    point: self.projector.project(level, p.point, image_size)?,
                    status: p.status,
                    color: self.palette.color(p.status).to_owned(),
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        Ok(FloorView {
            level,
            heading: floor.heading(),
            image,
            image_size,
            bounds,
            markers,
        })
    }
}

/// Fetch every page for a location (and floor), following `next`.
async fn fetch_all<S: FloorPlanSource>(
    source: &S,
    location: &EntityId,
    floor: Option<i32>,
) -> Result<Vec<FloorPlanPage>, CoreError> {
    let mut pages = vec![source.floorplan(location, floor).await?];
    while let Some(cursor) = pages.last().and_then(|p| p.next.clone()) {
        pages.push(source.floorplan_next(&cursor).await?);
    }
    Ok(pages)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use pretty_assertions::assert_eq;

    use crate::model::{IndoorPlacement, PlanarPoint};
    use crate::source::FixedImageSize;

    fn placement(id: &str, floor: i32, x: f64, y: f64, status: Status) -> IndoorPlacement {
        IndoorPlacement {
            device_id: EntityId::from(id),
            name: id.to_owned(),
            floor,
            floor_name: Some(format!("Level {floor}")),
            image: Some(format!("/media/floor-{floor}.png")),
            point: PlanarPoint::new(x, y),
            status,
        }
    }

    /// Floors 2, 1, 0, -1. The unfiltered feed returns floor 1 across two
    /// pages; other floors only come back when asked for.
    #[derive(Default)]
    struct FakeFloors {
        calls: Mutex<Vec<String>>,
        fail: AtomicBool,
    }

    impl FakeFloors {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl FloorPlanSource for FakeFloors {
        async fn floorplan(
            &self,
            _location: &EntityId,
            floor: Option<i32>,
        ) -> Result<FloorPlanPage, CoreError> {
            self.calls.lock().unwrap().push(format!("floor:{floor:?}"));
            if self.fail.load(Ordering::SeqCst) {
                return Err(CoreError::FetchFailed {
                    message: "down".into(),
                    status: None,
                });
            }
            let floors = vec![2, 1, 0, -1];
            Ok(match floor {
                None => FloorPlanPage {
                    floors,
                    next: Some("page-2".into()),
                    placements: vec![placement("ap-1", 1, 0.0, 0.0, Status::Ok)],
                },
                Some(level) => FloorPlanPage {
                    floors,
                    next: None,
                    placements: vec![placement("sw", level, 10.0, 10.0, Status::Critical)],
                },
            })
        }

        async fn floorplan_next(&self, cursor: &str) -> Result<FloorPlanPage, CoreError> {
            self.calls.lock().unwrap().push(format!("next:{cursor}"));
            Ok(FloorPlanPage {
                floors: vec![2, 1, 0, -1],
                next: None,
                placements: vec![placement("ap-2", 1, -20.0, 4.0, Status::Problem)],
            })
        }
    }

    struct BrokenImage;

    impl FloorImageLoader for BrokenImage {
        async fn dimensions(&self, image: &str) -> Result<ImageDimensions, CoreError> {
            Err(CoreError::FetchFailed {
                message: format!("{image}: 404"),
                status: Some(404),
            })
        }
    }

    async fn open() -> (Arc<FakeFloors>, FloorPlanSession<FakeFloors>) {
        let source = Arc::new(FakeFloors::default());
        let session = FloorPlanSession::open(
            EntityId::from("loc-1"),
            Arc::clone(&source),
            IndoorProjector::for_max_zoom(2),
            StatusPalette::default(),
            5,
        )
        .await
        .unwrap();
        (source, session)
    }

    fn loader() -> FixedImageSize {
        FixedImageSize(ImageDimensions::new(800.0, 600.0))
    }

    #[tokio::test]
    async fn open_follows_pages_and_selects_first_device_floor() {
        let (source, session) = open().await;
        assert_eq!(session.navigator().floors(), &[2, 1, 0, -1]);
        assert_eq!(session.navigator().selected_level(), Some(1));
        assert_eq!(session.cached_floor(1).unwrap().placements.len(), 2);
        assert_eq!(source.calls(), vec!["floor:None", "next:page-2"]);
    }

    #[tokio::test]
    async fn show_selected_projects_devices() {
        let (source, mut session) = open().await;
        let view = session.show_selected(&loader()).await.unwrap();

        assert_eq!(view.level, 1);
        assert_eq!(view.heading, "Level 1");
        assert_eq!(view.image, "/media/floor-1.png");
        assert_eq!(view.markers[0].point, GeoPoint::new(0.0, 0.0));
        assert_eq!(view.markers[1].point, GeoPoint::new(2.0, -10.0));
        assert_eq!(view.markers[1].color, "#ffb442");
        // cached: no further fetch
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn uncached_floor_is_fetched_once() {
        let (source, mut session) = open().await;

        let view = session.show_floor(-1, &loader()).await.unwrap();
        assert_eq!(view.markers.len(), 1);
        assert_eq!(view.markers[0].status, Status::Critical);

        session.show_floor(-1, &loader()).await.unwrap();
        assert_eq!(
            source.calls(),
            vec!["floor:None", "next:page-2", "floor:Some(-1)"]
        );
    }

    #[tokio::test]
    async fn arrows_walk_the_floor_list() {
        let (_source, mut session) = open().await;
        let up = session.step_up(&loader()).await.unwrap().unwrap();
        assert_eq!(up.level, 2);
        assert!(session.step_up(&loader()).await.unwrap().is_none());

        let down = session.step_down(&loader()).await.unwrap().unwrap();
        assert_eq!(down.level, 1);
    }

    #[tokio::test]
    async fn unknown_floor_is_rejected() {
        let (_source, mut session) = open().await;
        let err = session.show_floor(9, &loader()).await.unwrap_err();
        assert!(matches!(err, CoreError::FloorNotFound { level: 9 }));
    }

    #[tokio::test]
    async fn fetch_failure_keeps_the_cache() {
        let (source, mut session) = open().await;
        source.fail.store(true, Ordering::SeqCst);

        let err = session.show_floor(0, &loader()).await.unwrap_err();
        assert!(matches!(err, CoreError::FetchFailed { .. }));
        assert!(!session.is_cached(0));
        assert!(session.is_cached(1));
        assert_eq!(session.navigator().selected_level(), Some(1));
    }

    #[tokio::test]
    async fn image_failure_is_a_projection_failure() {
        let (_source, mut session) = open().await;
        let err = session.show_selected(&BrokenImage).await.unwrap_err();
        assert!(matches!(err, CoreError::ProjectionFailed { level: 1, .. }));
    }
}
