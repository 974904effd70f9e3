//! The "SPACE" Engine - Overlay Geometry Projection
//!
//! Converts resolved annotations into screen geometry:
//! - Normalized detection boxes into pixel rectangles, clipped to the frame
//! - Geographic positions into map-viewport coordinates
//! - Geographic tracks into screen polylines
//!
//! The map projection is a plain equirectangular (linear lat/lon) mapping.
//! It ignores earth curvature, which is only acceptable for extents of a
//! few degrees, so `MapExtent` refuses anything wider than
//! `MAX_EXTENT_SPAN_DEG`.

use crate::error::ProjectionError;
use crate::sentinel_timeline::{NormalizedBox, TelemetrySample};
use geo::{Coord, LineString, Point, Rect};
use serde::{Deserialize, Serialize};

/// Widest lat or lon span (degrees) the linear projection accepts.
pub const MAX_EXTENT_SPAN_DEG: f64 = 10.0;

// ============================================================================
// PIXEL SPACE
// ============================================================================

/// A drawing surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ViewportSize")]
pub struct Viewport {
    width: f64,
    height: f64,
}

/// Unchecked wire form of a `Viewport`.
#[derive(Deserialize)]
struct ViewportSize {
    width: f64,
    height: f64,
}

impl TryFrom<ViewportSize> for Viewport {
    type Error = ProjectionError;

    fn try_from(size: ViewportSize) -> Result<Self, Self::Error> {
        Viewport::new(size.width, size.height)
    }
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Result<Self, ProjectionError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(width) || !valid(height) {
            return Err(ProjectionError::InvalidViewport { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }
}

/// Axis-aligned pixel rectangle, origin at the top-left of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// A detection box in pixels.
///
/// `raw` is the straight denormalization; `clipped` has each edge clamped
/// to the viewport. The shape may be truncated, never rescaled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxOverlay {
    pub raw: PixelRect,
    pub clipped: PixelRect,
}

impl BoxOverlay {
    /// True when clipping cut part of the box off.
    pub fn truncated(&self) -> bool {
        self.raw != self.clipped
    }
}

/// Denormalize a center/size box into viewport pixels.
///
/// ```text
/// left = (cx - w/2) * W      width  = w * W
/// top  = (cy - h/2) * H      height = h * H
/// ```
pub fn denormalize_box(bbox: &NormalizedBox, viewport: &Viewport) -> BoxOverlay {
    let (vw, vh) = (viewport.width(), viewport.height());
    let raw = PixelRect {
        left: (bbox.cx - bbox.w / 2.0) * vw,
        top: (bbox.cy - bbox.h / 2.0) * vh,
        width: bbox.w * vw,
        height: bbox.h * vh,
    };

    let left = raw.left.clamp(0.0, vw);
    let top = raw.top.clamp(0.0, vh);
    let right = raw.right().clamp(0.0, vw);
    let bottom = raw.bottom().clamp(0.0, vh);

    BoxOverlay {
        raw,
        clipped: PixelRect {
            left,
            top,
            width: right - left,
            height: bottom - top,
        },
    }
}

// ============================================================================
// MAP SPACE
// ============================================================================

/// The visible geographic window of a map view.
///
/// Stored as a `geo::Rect` with x = longitude, y = latitude. Serialized as
/// plain degree bounds and re-validated on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ExtentBounds", into = "ExtentBounds")]
pub struct MapExtent {
    bounds: Rect<f64>,
}

#[derive(Serialize, Deserialize)]
struct ExtentBounds {
    lat_min: f64,
    lat_max: f64,
    lon_min: f64,
    lon_max: f64,
}

impl TryFrom<ExtentBounds> for MapExtent {
    type Error = ProjectionError;

    fn try_from(b: ExtentBounds) -> Result<Self, Self::Error> {
        MapExtent::new(b.lat_min, b.lat_max, b.lon_min, b.lon_max)
    }
}

impl From<MapExtent> for ExtentBounds {
    fn from(extent: MapExtent) -> Self {
        Self {
            lat_min: extent.lat_min(),
            lat_max: extent.lat_max(),
            lon_min: extent.lon_min(),
            lon_max: extent.lon_max(),
        }
    }
}

impl MapExtent {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Result<Self, ProjectionError> {
        let on_globe = (-90.0..=90.0).contains(&lat_min)
            && (-90.0..=90.0).contains(&lat_max)
            && (-180.0..=180.0).contains(&lon_min)
            && (-180.0..=180.0).contains(&lon_max);
        if !on_globe || lat_min >= lat_max || lon_min >= lon_max {
            return Err(ProjectionError::InvalidExtent {
                lat_min,
                lat_max,
                lon_min,
                lon_max,
            });
        }

        let span_deg = (lat_max - lat_min).max(lon_max - lon_min);
        if span_deg > MAX_EXTENT_SPAN_DEG {
            return Err(ProjectionError::ExtentTooLarge {
                span_deg,
                limit_deg: MAX_EXTENT_SPAN_DEG,
            });
        }

        Ok(Self {
            bounds: Rect::new(
                Coord { x: lon_min, y: lat_min },
                Coord { x: lon_max, y: lat_max },
            ),
        })
    }

    pub fn lat_min(&self) -> f64 {
        self.bounds.min().y
    }

    pub fn lat_max(&self) -> f64 {
        self.bounds.max().y
    }

    pub fn lon_min(&self) -> f64 {
        self.bounds.min().x
    }

    pub fn lon_max(&self) -> f64 {
        self.bounds.max().x
    }

    /// Inclusive containment; edges belong to the extent.
    pub fn contains(&self, point: &Point<f64>) -> bool {
        (self.lon_min()..=self.lon_max()).contains(&point.x())
            && (self.lat_min()..=self.lat_max()).contains(&point.y())
    }
}

/// Where a geographic point lands on the map viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MapProjection {
    /// Inside the extent; `at` is in viewport pixels.
    Visible { at: Coord<f64> },

    /// Outside the extent. `edge` is the projected position clamped to the
    /// viewport border, for callers that pin off-map markers to the edge.
    OutOfBounds { edge: Coord<f64> },

    /// Non-finite input coordinates.
    Unprojectable,
}

impl MapProjection {
    pub fn is_visible(&self) -> bool {
        matches!(self, MapProjection::Visible { .. })
    }

    /// The drawable position, if the point is inside the extent.
    pub fn visible_at(&self) -> Option<Coord<f64>> {
        match self {
            MapProjection::Visible { at } => Some(*at),
            _ => None,
        }
    }
}

/// A map extent rendered onto a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub extent: MapExtent,
    pub viewport: Viewport,
}

impl MapView {
    pub fn new(extent: MapExtent, viewport: Viewport) -> Self {
        Self { extent, viewport }
    }

    /// Equirectangular projection of one point.
    ///
    /// ```text
    /// x = (lon - lonMin) / (lonMax - lonMin) * W
    /// y = (latMax - lat) / (latMax - latMin) * H   (north is up)
    /// ```
    pub fn project(&self, point: Point<f64>) -> MapProjection {
        if !point.x().is_finite() || !point.y().is_finite() {
            return MapProjection::Unprojectable;
        }

        let e = &self.extent;
        let (w, h) = (self.viewport.width(), self.viewport.height());
        let at = Coord {
            x: (point.x() - e.lon_min()) / (e.lon_max() - e.lon_min()) * w,
            y: (e.lat_max() - point.y()) / (e.lat_max() - e.lat_min()) * h,
        };

        if e.contains(&point) {
            MapProjection::Visible { at }
        } else {
            MapProjection::OutOfBounds {
                edge: Coord {
                    x: at.x.clamp(0.0, w),
                    y: at.y.clamp(0.0, h),
                },
            }
        }
    }

    /// Map marker position for a telemetry sample.
    pub fn project_telemetry(&self, sample: &TelemetrySample) -> MapProjection {
        self.project(sample.position())
    }

    /// Project a track vertex by vertex, keeping input order.
    ///
    /// Fewer than two points make no line and yield `None`.
    pub fn project_track(&self, points: &[Point<f64>]) -> Option<ProjectedTrack> {
        if points.len() < 2 {
            return None;
        }
        Some(ProjectedTrack {
            vertices: points.iter().map(|p| self.project(*p)).collect(),
        })
    }
}

/// A projected track, one entry per input vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedTrack {
    pub vertices: Vec<MapProjection>,
}

impl ProjectedTrack {
    /// Screen polyline through every vertex, with off-map vertices pinned
    /// to the viewport edge. Unprojectable vertices are skipped.
    pub fn polyline(&self) -> LineString<f64> {
        self.vertices
            .iter()
            .filter_map(|v| match v {
                MapProjection::Visible { at } => Some(*at),
                MapProjection::OutOfBounds { edge } => Some(*edge),
                MapProjection::Unprojectable => None,
            })
            .collect::<Vec<_>>()
            .into()
    }

    pub fn all_visible(&self) -> bool {
        self.vertices.iter().all(MapProjection::is_visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn malta_view() -> MapView {
        MapView::new(
            MapExtent::new(35.82, 35.90, 14.48, 14.54).unwrap(),
            Viewport::new(600.0, 400.0).unwrap(),
        )
    }

    #[test]
    fn test_deserialize_validates() {
        let view: MapView = serde_json::from_str(
            r#"{ "extent": { "lat_min": 35.82, "lat_max": 35.90, "lon_min": 14.48, "lon_max": 14.54 },
                 "viewport": { "width": 600, "height": 400 } }"#,
        )
        .unwrap();
        assert_eq!(view, malta_view());

        let inverted = r#"{ "lat_min": 35.90, "lat_max": 35.82, "lon_min": 14.48, "lon_max": 14.54 }"#;
        assert!(serde_json::from_str::<MapExtent>(inverted).is_err());
        let flat = r#"{ "lat_min": 35.82, "lat_max": 35.82, "lon_min": 14.48, "lon_max": 14.54 }"#;
        assert!(serde_json::from_str::<MapExtent>(flat).is_err());
        assert!(serde_json::from_str::<Viewport>(r#"{ "width": 0, "height": 400 }"#).is_err());

        let json = serde_json::to_string(&malta_view().extent).unwrap();
        assert!(json.contains("\"lat_min\":35.82"));
    }

    #[test]
    fn test_box_clipped_at_far_edge() {
        let viewport = Viewport::new(100.0, 100.0).unwrap();
        let overlay = denormalize_box(&NormalizedBox::new(0.9, 0.9, 0.3, 0.3), &viewport);

        assert_relative_eq!(overlay.raw.left, 75.0, epsilon = 1e-9);
        assert_relative_eq!(overlay.raw.top, 75.0, epsilon = 1e-9);
        assert_relative_eq!(overlay.raw.width, 30.0, epsilon = 1e-9);
        assert_relative_eq!(overlay.raw.height, 30.0, epsilon = 1e-9);

        assert_relative_eq!(overlay.clipped.left, 75.0, epsilon = 1e-9);
        assert_relative_eq!(overlay.clipped.top, 75.0, epsilon = 1e-9);
        assert_relative_eq!(overlay.clipped.width, 25.0, epsilon = 1e-9);
        assert_relative_eq!(overlay.clipped.height, 25.0, epsilon = 1e-9);
        assert!(overlay.truncated());
    }

    #[test]
    fn test_box_clipped_at_near_edge() {
        let viewport = Viewport::new(200.0, 100.0).unwrap();
        let overlay = denormalize_box(&NormalizedBox::new(0.05, 0.5, 0.2, 0.2), &viewport);

        assert_relative_eq!(overlay.raw.left, -10.0, epsilon = 1e-9);
        assert_relative_eq!(overlay.clipped.left, 0.0);
        assert_relative_eq!(overlay.clipped.width, 30.0, epsilon = 1e-9);
        assert_relative_eq!(overlay.clipped.top, 40.0, epsilon = 1e-9);
        assert_relative_eq!(overlay.clipped.height, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_box_inside_is_untouched() {
        let viewport = Viewport::new(1280.0, 720.0).unwrap();
        let overlay = denormalize_box(&NormalizedBox::new(0.5, 0.5, 0.25, 0.5), &viewport);

        assert!(!overlay.truncated());
        assert_relative_eq!(overlay.clipped.left, 480.0);
        assert_relative_eq!(overlay.clipped.top, 180.0);
        assert_relative_eq!(overlay.clipped.right(), 800.0);
        assert_relative_eq!(overlay.clipped.bottom(), 540.0);
    }

    #[test]
    fn test_invalid_viewport() {
        assert!(Viewport::new(0.0, 100.0).is_err());
        assert!(Viewport::new(100.0, f64::NAN).is_err());
        assert!(Viewport::new(-1.0, 1.0).is_err());
    }

    #[test]
    fn test_extent_corners() {
        let view = malta_view();

        let top_left = view.project(Point::new(14.48, 35.90)).visible_at().unwrap();
        assert_relative_eq!(top_left.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(top_left.y, 0.0, epsilon = 1e-9);

        let bottom_right = view.project(Point::new(14.54, 35.82)).visible_at().unwrap();
        assert_relative_eq!(bottom_right.x, 600.0, epsilon = 1e-9);
        assert_relative_eq!(bottom_right.y, 400.0, epsilon = 1e-9);
    }

    #[test]
    fn test_telemetry_marker_center() {
        let view = malta_view();
        let sample = TelemetrySample::new(0.0, 35.86, 14.51);
        let at = view.project_telemetry(&sample).visible_at().unwrap();
        assert_relative_eq!(at.x, 300.0, epsilon = 1e-6);
        assert_relative_eq!(at.y, 200.0, epsilon = 1e-6);
    }

    #[test]
    fn test_out_of_bounds_is_flagged() {
        let view = malta_view();
        match view.project(Point::new(14.60, 35.95)) {
            MapProjection::OutOfBounds { edge } => {
                assert_relative_eq!(edge.x, 600.0);
                assert_relative_eq!(edge.y, 0.0);
            }
            other => panic!("expected out of bounds, got {:?}", other),
        }
        assert_eq!(view.project(Point::new(f64::NAN, 35.85)), MapProjection::Unprojectable);
    }

    #[test]
    fn test_extent_validation() {
        assert!(matches!(
            MapExtent::new(35.90, 35.82, 14.48, 14.54),
            Err(ProjectionError::InvalidExtent { .. })
        ));
        assert!(matches!(
            MapExtent::new(35.0, 35.0, 14.0, 14.5),
            Err(ProjectionError::InvalidExtent { .. })
        ));
        assert!(matches!(
            MapExtent::new(-80.0, 80.0, -170.0, 170.0),
            Err(ProjectionError::ExtentTooLarge { .. })
        ));
        assert!(MapExtent::new(30.0, 40.0, 10.0, 20.0).is_ok());
    }

    #[test]
    fn test_track_keeps_order() {
        let view = malta_view();
        let points = vec![
            Point::new(14.50, 35.82),
            Point::new(14.51, 35.84),
            Point::new(14.515, 35.85),
            Point::new(14.5156, 35.8522),
        ];
        let track = view.project_track(&points).unwrap();
        assert_eq!(track.vertices.len(), 4);
        assert!(track.all_visible());

        let line = track.polyline();
        let ys: Vec<f64> = line.coords().map(|c| c.y).collect();
        assert!(ys.windows(2).all(|w| w[0] > w[1]), "northbound track should climb the screen");
    }

    #[test]
    fn test_degenerate_tracks() {
        let view = malta_view();
        assert!(view.project_track(&[]).is_none());
        assert!(view.project_track(&[Point::new(14.5, 35.85)]).is_none());
    }

    #[test]
    fn test_track_with_off_map_vertex() {
        let view = malta_view();
        let points = vec![Point::new(14.50, 35.85), Point::new(14.70, 35.85)];
        let track = view.project_track(&points).unwrap();
        assert!(!track.all_visible());
        let last = track.polyline().coords().last().copied().unwrap();
        assert_relative_eq!(last.x, 600.0);
    }
}
