// ── Data source seams ──
//
// The engine talks to the server through these traits so tests can
// swap in scripted fakes. `MonitoringClient` implements all of them.

use std::future::Future;
use std::io::Cursor;

use fleetmap_api::{MonitoringClient, RosterQuery};
use image::ImageReader;
use tracing::debug;

use crate::convert::{self, LocationPage};
use crate::error::CoreError;
use crate::indoor::ImageDimensions;
use crate::model::{EntityId, FloorPlanPage, RosterPage};
use crate::roster::RosterFilter;

/// Paged bulk location feed.
pub trait LocationSource: Send + Sync {
    /// Fetch one page. `None` fetches the first page.
    fn locations_page(
        &self,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<LocationPage, CoreError>> + Send;
}

/// Paged device roster of one location.
pub trait RosterSource: Send + Sync {
    fn first_page(
        &self,
        location: &EntityId,
        filter: &RosterFilter,
    ) -> impl Future<Output = Result<RosterPage, CoreError>> + Send;

    fn next_page(&self, cursor: &str) -> impl Future<Output = Result<RosterPage, CoreError>> + Send;
}

/// Paged indoor coordinates of one location.
pub trait FloorPlanSource: Send + Sync {
    fn floorplan(
        &self,
        location: &EntityId,
        floor: Option<i32>,
    ) -> impl Future<Output = Result<FloorPlanPage, CoreError>> + Send;

    fn floorplan_next(
        &self,
        cursor: &str,
    ) -> impl Future<Output = Result<FloorPlanPage, CoreError>> + Send;
}

/// Resolves a floor image reference to its pixel size.
pub trait FloorImageLoader: Send + Sync {
    fn dimensions(
        &self,
        image: &str,
    ) -> impl Future<Output = Result<ImageDimensions, CoreError>> + Send;
}

/// Every image has the same, known size. Skips fetching entirely.
#[derive(Debug, Clone, Copy)]
pub struct FixedImageSize(pub ImageDimensions);

impl FloorImageLoader for FixedImageSize {
    async fn dimensions(&self, _image: &str) -> Result<ImageDimensions, CoreError> {
        Ok(self.0)
    }
}

// ── MonitoringClient ────────────────────────────────────────────────

impl LocationSource for MonitoringClient {
    async fn locations_page(&self, cursor: Option<&str>) -> Result<LocationPage, CoreError> {
        let raw = MonitoringClient::locations_page(self, cursor).await?;
        Ok(LocationPage::from(raw))
    }
}

impl RosterSource for MonitoringClient {
    async fn first_page(
        &self,
        location: &EntityId,
        filter: &RosterFilter,
    ) -> Result<RosterPage, CoreError> {
        let query = RosterQuery {
            search: filter.query_search(),
            statuses: filter
                .statuses()
                .map(|s| s.as_str().to_owned())
                .collect(),
        };
        let raw = self.roster(&location.to_string(), &query).await?;
        Ok(RosterPage::from(raw))
    }

    async fn next_page(&self, cursor: &str) -> Result<RosterPage, CoreError> {
        Ok(RosterPage::from(self.roster_page(cursor).await?))
    }
}

impl FloorPlanSource for MonitoringClient {
    async fn floorplan(
        &self,
        location: &EntityId,
        floor: Option<i32>,
    ) -> Result<FloorPlanPage, CoreError> {
        let raw = MonitoringClient::floorplan(self, &location.to_string(), floor).await?;
        Ok(convert::floorplan_page(raw).0)
    }

    async fn floorplan_next(&self, cursor: &str) -> Result<FloorPlanPage, CoreError> {
        Ok(convert::floorplan_page(self.floorplan_page(cursor).await?).0)
    }
}

impl FloorImageLoader for MonitoringClient {
    /// Downloads the image and reads its size from the header.
    async fn dimensions(&self, image: &str) -> Result<ImageDimensions, CoreError> {
        let bytes = self.floor_image(image).await?;
        let (width, height) = measure(&bytes)
            .map_err(|reason| CoreError::shape("floor image", image, reason))?;
        debug!(image, width, height, "floor image measured");
        Ok(ImageDimensions::new(f64::from(width), f64::from(height)))
    }
}

/// Pixel size of an encoded image, format sniffed from its bytes.
fn measure(bytes: &[u8]) -> Result<(u32, u32), String> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .into_dimensions()
        .map_err(|e| e.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn measures_encoded_png() {
        let mut png = Vec::new();
        image::RgbImage::new(640, 480)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        assert_eq!(measure(&png).unwrap(), (640, 480));
    }

    #[test]
    fn rejects_bytes_that_are_not_an_image() {
        assert!(measure(b"<html>login</html>").is_err());
    }
}
