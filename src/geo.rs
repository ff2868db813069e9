use glam::DVec2;
use std::f64::consts::PI;

/// A WGS-84 position
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Longitude to normalized Web Mercator x in [0, 1]
#[inline(always)]
pub fn lng_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

/// Latitude to normalized Web Mercator y in [0, 1], north at 0.
/// Poles clamp to the edges.
#[inline(always)]
pub fn lat_y(lat: f64) -> f64 {
    let sin = (lat * PI / 180.0).sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    y.clamp(0.0, 1.0)
}

#[inline(always)]
pub fn x_lng(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

#[inline(always)]
pub fn y_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0) * PI / 180.0;
    360.0 * y2.exp().atan() / PI - 90.0
}

#[inline(always)]
pub fn project(point: GeoPoint) -> DVec2 {
    DVec2::new(lng_x(point.lng), lat_y(point.lat))
}

#[inline(always)]
pub fn unproject(p: DVec2) -> GeoPoint {
    GeoPoint::new(y_lat(p.y), x_lng(p.x))
}

/// Wrap a longitude into [-180, 180)
#[inline(always)]
pub fn wrap_lng(lng: f64) -> f64 {
    (lng + 180.0).rem_euclid(360.0) - 180.0
}
