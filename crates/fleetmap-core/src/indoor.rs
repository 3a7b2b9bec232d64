// ── Indoor projection ──
//
// Floor images are drawn on a flat map whose CRS maps (lat, lng) at zoom
// z to pixel (lng·2^z, −lat·2^z). The image is centred on an anchor
// point; a raw device coordinate (x, y) is a pixel offset from the image
// centre with y pointing up.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{GeoPoint, PlanarPoint};

/// Natural size of a floor image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: f64,
    pub height: f64,
}

impl ImageDimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// A point in pixel space at the projector's zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

/// Map-space rectangle covered by an image overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayBounds {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

/// Places floor images and indoor devices on the flat floor map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndoorProjector {
    anchor: GeoPoint,
    zoom: i32,
}

impl IndoorProjector {
    pub fn new(anchor: GeoPoint, zoom: i32) -> Self {
        Self { anchor, zoom }
    }

    /// Anchor (0, 0), one level below the map's maximum zoom.
    pub fn for_max_zoom(max_zoom: i32) -> Self {
        Self::new(GeoPoint::new(0.0, 0.0), max_zoom - 1)
    }

    pub fn anchor(&self) -> GeoPoint {
        self.anchor
    }

    pub fn zoom(&self) -> i32 {
        self.zoom
    }

    fn scale(&self) -> f64 {
        2.0_f64.powi(self.zoom)
    }

    pub fn to_pixel(&self, point: GeoPoint) -> PixelPoint {
        let scale = self.scale();
        PixelPoint {
            x: point.lng * scale,
            y: -point.lat * scale,
        }
    }

    pub fn from_pixel(&self, pixel: PixelPoint) -> GeoPoint {
        let scale = self.scale();
        GeoPoint::new(-pixel.y / scale, pixel.x / scale)
    }

    /// Top-left and bottom-right pixel corners of an image centred on
    /// the anchor.
    pub fn image_corners(
        &self,
        level: i32,
        image: ImageDimensions,
    ) -> Result<(PixelPoint, PixelPoint), CoreError> {
        if !image.is_usable() {
            return Err(CoreError::ProjectionFailed {
                level,
                reason: format!(
                    "floor image has no usable size ({}x{})",
                    image.width, image.height
                ),
            });
        }
        let centre = self.to_pixel(self.anchor);
        let top_left = PixelPoint {
            x: centre.x - image.width / 2.0,
            y: centre.y - image.height / 2.0,
        };
        let bottom_right = PixelPoint {
            x: centre.x + image.width / 2.0,
            y: centre.y + image.height / 2.0,
        };
        Ok((top_left, bottom_right))
    }

    /// Map-space bounds for the image overlay.
    pub fn overlay_bounds(
        &self,
        level: i32,
        image: ImageDimensions,
    ) -> Result<OverlayBounds, CoreError> {
        let (top_left, bottom_right) = self.image_corners(level, image)?;
        Ok(OverlayBounds {
            south_west: self.from_pixel(PixelPoint {
                x: top_left.x,
                y: bottom_right.y,
            }),
            north_east: self.from_pixel(PixelPoint {
                x: bottom_right.x,
                y: top_left.y,
            }),
        })
    }

    /// Map position of a raw indoor coordinate.
    ///
    /// Equivalent to `top_left + (w/2 + x, h/2 − y)`; computed from the
    /// anchor directly so (0, 0) lands on the anchor exactly.
    pub fn project(
        &self,
        level: i32,
        raw: PlanarPoint,
        image: ImageDimensions,
    ) -> Result<GeoPoint, CoreError> {
        self.image_corners(level, image)?;
        let centre = self.to_pixel(self.anchor);
        Ok(self.from_pixel(PixelPoint {
            x: centre.x + raw.x,
            y: centre.y - raw.y,
        }))
    }
}
