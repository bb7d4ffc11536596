//! Map camera for viewport management, panning, and zooming

use serde::Serialize;

use super::projection::{
    clamp_latitude, lng_lat_to_world, normalize_longitude, world_size, world_to_lng_lat,
};
use crate::geojson::LngLat;

pub const MIN_ZOOM: f64 = 0.0;
pub const MAX_ZOOM: f64 = 22.0;

/// Position in screen pixels, origin at the top-left of the viewport
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &ScreenPoint) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Visible geographic rectangle, read fresh before every fetch
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Viewport {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Viewport {
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self { west, south, east, north }
    }

    /// `west,south,east,north` as expected by the backend `bbox` parameter
    pub fn to_bbox_param(&self) -> String {
        format!("{},{},{},{}", self.west, self.south, self.east, self.north)
    }

    pub fn contains(&self, at: LngLat) -> bool {
        let within_lng = if self.west <= self.east {
            at.lng >= self.west && at.lng <= self.east
        } else {
            // Crosses the antimeridian
            at.lng >= self.west || at.lng <= self.east
        };
        within_lng && at.lat >= self.south && at.lat <= self.north
    }
}

/// Map camera state
#[derive(Clone, Debug)]
pub struct MapCamera {
    /// Center position
    pub center: LngLat,

    /// Current zoom level (fractional for smooth zooming)
    pub zoom: f64,

    /// Viewport size in pixels
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl MapCamera {
    pub fn new(center: LngLat, zoom: f64, width: u32, height: u32) -> Self {
        Self {
            center: LngLat::new(normalize_longitude(center.lng), clamp_latitude(center.lat)),
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            viewport_width: width,
            viewport_height: height,
        }
    }

    /// Update viewport size
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport_width = width;
        self.viewport_height = height;
    }

    fn half_viewport(&self) -> (f64, f64) {
        (self.viewport_width as f64 / 2.0, self.viewport_height as f64 / 2.0)
    }

    /// Pan the map by pixel delta (content follows the pointer)
    pub fn pan(&mut self, dx_pixels: f32, dy_pixels: f32) {
        let (cx, cy) = lng_lat_to_world(self.center, self.zoom);
        self.center = world_to_lng_lat(cx - dx_pixels as f64, cy - dy_pixels as f64, self.zoom);
    }

    /// Zoom keeping the geographic point under the cursor stationary
    pub fn zoom_at(&mut self, delta: f64, screen: ScreenPoint) {
        let old_zoom = self.zoom;
        let new_zoom = (self.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);

        if (new_zoom - old_zoom).abs() < 0.001 {
            return;
        }

        let anchor = self.unproject(screen);
        self.zoom = new_zoom;

        // Re-center so `anchor` projects back onto `screen`
        let (ax, ay) = lng_lat_to_world(anchor, self.zoom);
        let (hw, hh) = self.half_viewport();
        let cx = ax - (screen.x as f64 - hw);
        let cy = ay - (screen.y as f64 - hh);
        self.center = world_to_lng_lat(cx, cy, self.zoom);
    }

    /// Simple zoom (centered)
    pub fn zoom_by(&mut self, delta: f64) {
        self.zoom = (self.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Jump to a new center and optionally a new zoom
    pub fn fly_to(&mut self, center: LngLat, zoom: Option<f64>) {
        self.center = LngLat::new(normalize_longitude(center.lng), clamp_latitude(center.lat));
        if let Some(zoom) = zoom {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    /// Geographic position to screen pixels
    pub fn project(&self, at: LngLat) -> ScreenPoint {
        let (px, py) = lng_lat_to_world(at, self.zoom);
        let (cx, cy) = lng_lat_to_world(self.center, self.zoom);

        let mut rel_x = px - cx;
        let rel_y = py - cy;

        // Handle world wrapping for X axis
        let size = world_size(self.zoom);
        if rel_x > size / 2.0 {
            rel_x -= size;
        } else if rel_x < -size / 2.0 {
            rel_x += size;
        }

        let (hw, hh) = self.half_viewport();
        ScreenPoint::new((hw + rel_x) as f32, (hh + rel_y) as f32)
    }

    /// Screen pixels to geographic position
    pub fn unproject(&self, screen: ScreenPoint) -> LngLat {
        let (cx, cy) = lng_lat_to_world(self.center, self.zoom);
        let (hw, hh) = self.half_viewport();
        world_to_lng_lat(cx + screen.x as f64 - hw, cy + screen.y as f64 - hh, self.zoom)
    }

    /// Current visible bounds
    pub fn bounds(&self) -> Viewport {
        let north_west = self.unproject(ScreenPoint::new(0.0, 0.0));
        let south_east = self.unproject(ScreenPoint::new(
            self.viewport_width as f32,
            self.viewport_height as f32,
        ));
        Viewport::new(north_west.lng, south_east.lat, south_east.lng, north_west.lat)
    }
}

impl Default for MapCamera {
    fn default() -> Self {
        // Continental US at zoom 4
        Self::new(LngLat::new(-98.5795, 39.8283), 4.0, 800, 600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn austin() -> MapCamera {
        MapCamera::new(LngLat::new(-97.7431, 30.2672), 12.0, 800, 600)
    }

    #[test]
    fn center_projects_to_middle_of_viewport() {
        let camera = austin();
        let p = camera.project(camera.center);
        assert!((p.x - 400.0).abs() < 0.01);
        assert!((p.y - 300.0).abs() < 0.01);
    }

    #[test]
    fn bounds_contain_center() {
        let camera = austin();
        let bounds = camera.bounds();
        assert!(bounds.west < bounds.east);
        assert!(bounds.south < bounds.north);
        assert!(bounds.contains(camera.center));
    }

    #[test]
    fn pan_moves_content_with_pointer() {
        let mut camera = austin();
        let before = camera.center;
        camera.pan(100.0, 0.0);
        // Dragging right reveals terrain to the west
        assert!(camera.center.lng < before.lng);
        assert!((camera.center.lat - before.lat).abs() < 1e-9);
    }

    #[test]
    fn zoom_at_keeps_anchor_stationary() {
        let mut camera = austin();
        let cursor = ScreenPoint::new(650.0, 120.0);
        let anchor = camera.unproject(cursor);

        camera.zoom_at(1.5, cursor);

        let after = camera.project(anchor);
        assert!(after.distance(&cursor) < 0.5);
        assert!((camera.zoom - 13.5).abs() < 1e-9);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut camera = austin();
        camera.zoom_by(100.0);
        assert_eq!(camera.zoom, MAX_ZOOM);
    }

    #[test]
    fn bbox_param_is_west_south_east_north() {
        let viewport = Viewport::new(-98.0, 30.0, -97.0, 31.0);
        assert_eq!(viewport.to_bbox_param(), "-98,30,-97,31");
    }
}
