//! Web Mercator (EPSG:3857) projection helpers
//! World pixel space: the whole world is `TILE_SIZE * 2^zoom` pixels wide

use std::f64::consts::PI;

use crate::geojson::LngLat;

/// Tile size in pixels (standard web map tile size)
pub const TILE_SIZE: f64 = 256.0;

/// Highest latitude representable in Web Mercator
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Width of the world in pixels at `zoom`
pub fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * 2.0_f64.powf(zoom)
}

/// Project longitude/latitude to world pixel coordinates at `zoom`
pub fn lng_lat_to_world(at: LngLat, zoom: f64) -> (f64, f64) {
    let size = world_size(zoom);

    let x = (at.lng + 180.0) / 360.0 * size;

    let lat_rad = clamp_latitude(at.lat).to_radians();
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * size;

    (x, y)
}

/// Inverse of [`lng_lat_to_world`]
pub fn world_to_lng_lat(x: f64, y: f64, zoom: f64) -> LngLat {
    let size = world_size(zoom);

    let lng = x / size * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * y / size)).sinh().atan();

    LngLat::new(normalize_longitude(lng), clamp_latitude(lat_rad.to_degrees()))
}

/// Wrap a longitude into [-180, 180]
pub fn normalize_longitude(lng: f64) -> f64 {
    if (-180.0..=180.0).contains(&lng) {
        return lng;
    }
    (lng + 180.0).rem_euclid(360.0) - 180.0
}

/// Clamp latitude to valid Mercator range
pub fn clamp_latitude(lat: f64) -> f64 {
    lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lng_lat_to_world() {
        // Seoul at zoom 10 lands in tile (873, 396)
        let (x, y) = lng_lat_to_world(LngLat::new(126.9780, 37.5665), 10.0);
        assert_eq!((x / TILE_SIZE).floor() as u32, 873);
        assert_eq!((y / TILE_SIZE).floor() as u32, 396);
    }

    #[test]
    fn test_world_round_trip() {
        let at = LngLat::new(-97.7431, 30.2672);
        let (x, y) = lng_lat_to_world(at, 13.5);
        let back = world_to_lng_lat(x, y, 13.5);
        assert!((back.lng - at.lng).abs() < 1e-9);
        assert!((back.lat - at.lat).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_longitude() {
        assert!((normalize_longitude(190.0) - (-170.0)).abs() < 0.001);
        assert!((normalize_longitude(-190.0) - 170.0).abs() < 0.001);
    }

    #[test]
    fn test_clamp_latitude() {
        assert_eq!(clamp_latitude(90.0), MAX_LATITUDE);
        assert_eq!(clamp_latitude(-90.0), -MAX_LATITUDE);
    }
}
