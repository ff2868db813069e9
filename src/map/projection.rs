use crate::cluster::MapRegion;
use crate::geo::{lat_y, lng_x, wrap_lng, x_lng, y_lat, GeoPoint};

/// Scale bounds: whole world across the canvas down to street level
const MIN_SCALE: f64 = 0.5;
const MAX_SCALE: f64 = 131_072.0;

/// Latitude limit of the Web Mercator square
const MAX_LAT: f64 = 85.0;

/// Pixel-space view of the map
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    /// Center longitude (-180 to 180)
    pub center_lon: f64,
    /// Center latitude (-85 to 85)
    pub center_lat: f64,
    /// Canvas widths per world width (higher = more zoomed in)
    pub zoom: f64,
    /// Canvas pixel width
    pub width: usize,
    /// Canvas pixel height
    pub height: usize,
}

impl Viewport {
    pub fn new(center_lon: f64, center_lat: f64, zoom: f64, width: usize, height: usize) -> Self {
        Self {
            center_lon,
            center_lat,
            zoom,
            width,
            height,
        }
    }

    /// Start over Virginia wine country
    pub fn home(width: usize, height: usize) -> Self {
        Self::new(-78.6, 38.0, 48.0, width, height)
    }

    #[inline(always)]
    fn scale(&self) -> f64 {
        self.zoom * self.width.max(1) as f64
    }

    #[inline(always)]
    fn center_xy(&self) -> (f64, f64) {
        (lng_x(self.center_lon), lat_y(self.center_lat))
    }

    fn recenter(&mut self, lon: f64, lat: f64) {
        self.center_lon = wrap_lng(lon);
        self.center_lat = lat.clamp(-MAX_LAT, MAX_LAT);
    }

    /// Pan the viewport by pixel delta
    pub fn pan(&mut self, dx: i32, dy: i32) {
        let (lon, lat) = self.unproject(self.width as i32 / 2 + dx, self.height as i32 / 2 + dy);
        self.recenter(lon, lat);
    }

    /// Zoom in by a factor
    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * 1.5).min(MAX_SCALE);
    }

    /// Zoom out by a factor
    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom / 1.5).max(MIN_SCALE);
    }

    /// Zoom in towards a specific pixel location
    pub fn zoom_in_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, 1.5);
    }

    /// Zoom out from a specific pixel location
    pub fn zoom_out_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, 1.0 / 1.5);
    }

    /// Zoom keeping the coordinate under (px, py) fixed
    fn zoom_at(&mut self, px: i32, py: i32, factor: f64) {
        let (lon, lat) = self.unproject(px, py);
        self.zoom = (self.zoom * factor).clamp(MIN_SCALE, MAX_SCALE);

        let (new_px, new_py) = self.project(lon, lat);
        self.pan(new_px - px, new_py - py);
    }

    pub fn center_on(&mut self, point: GeoPoint) {
        self.recenter(point.lng, point.lat);
    }

    /// Show the whole of `region`, preserving the canvas aspect
    pub fn fit(&mut self, region: &MapRegion) {
        let bbox = region.bbox();
        let zoom_lng = 360.0 / region.lng_delta;
        let y_span = (lat_y(bbox.south.max(-MAX_LAT)) - lat_y(bbox.north.min(MAX_LAT))).abs();
        let zoom_lat = if y_span > 0.0 {
            self.height as f64 / (self.width.max(1) as f64 * y_span)
        } else {
            zoom_lng
        };
        let zoom = zoom_lng.min(zoom_lat);
        if zoom.is_finite() {
            self.zoom = zoom.clamp(MIN_SCALE, MAX_SCALE);
        }
        self.recenter(region.center_lng, region.center_lat);
    }

    /// Geographic region covered by the canvas
    pub fn region(&self) -> MapRegion {
        let (_, north) = self.unproject(0, 0);
        let (_, south) = self.unproject(0, self.height as i32);
        MapRegion {
            center_lat: (north + south) / 2.0,
            center_lng: self.center_lon,
            lat_delta: north - south,
            lng_delta: 360.0 * self.width as f64 / self.scale(),
        }
    }

    /// Unproject pixel coordinates back to geographic coordinates (lon, lat)
    pub fn unproject(&self, px: i32, py: i32) -> (f64, f64) {
        let scale = self.scale();
        let (cx, cy) = self.center_xy();
        let x = (px as f64 - self.width as f64 / 2.0) / scale + cx;
        let y = (py as f64 - self.height as f64 / 2.0) / scale + cy;
        (x_lng(x), y_lat(y))
    }

    /// Project a geographic coordinate (lon, lat) to pixel coordinates
    pub fn project(&self, lon: f64, lat: f64) -> (i32, i32) {
        let scale = self.scale();
        let (cx, cy) = self.center_xy();
        let px = ((lng_x(lon) - cx) * scale + self.width as f64 / 2.0).round() as i32;
        let py = ((lat_y(lat) - cy) * scale + self.height as f64 / 2.0).round() as i32;
        (px, py)
    }

    /// Check if a projected point is visible in the viewport
    pub fn is_visible(&self, px: i32, py: i32) -> bool {
        px >= 0 && px < self.width as i32 && py >= 0 && py < self.height as i32
    }

    /// Check if a line segment might be visible (rough bounding box check)
    pub fn line_might_be_visible(&self, p1: (i32, i32), p2: (i32, i32)) -> bool {
        p1.0.max(p2.0) >= 0
            && p1.0.min(p2.0) < self.width as i32
            && p1.1.max(p2.1) >= 0
            && p1.1.min(p2.1) < self.height as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::derive_zoom;

    #[test]
    fn test_project_center() {
        let vp = Viewport::new(0.0, 0.0, 1.0, 100, 100);
        assert_eq!(vp.project(0.0, 0.0), (50, 50));
    }

    #[test]
    fn test_pan_moves_center_east() {
        let mut vp = Viewport::new(0.0, 0.0, 1.0, 100, 100);
        vp.pan(10, 0);
        assert!(vp.center_lon > 0.0);
        assert!(vp.center_lat.abs() < 1e-9);
    }

    #[test]
    fn test_pan_wraps_longitude() {
        let mut vp = Viewport::new(179.0, 0.0, 1.0, 360, 100);
        vp.pan(10, 0);
        assert!(vp.center_lon < 0.0);
    }

    #[test]
    fn test_region_spans_match_scale() {
        let vp = Viewport::new(-78.0, 38.0, 72.0, 200, 100);
        let region = vp.region();
        assert!((region.lng_delta - 5.0).abs() < 1e-9);
        assert_eq!(derive_zoom(region.lng_delta), Ok(5));
        assert!(region.lat_delta > 0.0 && region.lat_delta < region.lng_delta);
    }

    #[test]
    fn test_zoom_changes_region_zoom_monotonically() {
        let mut vp = Viewport::home(200, 100);
        let mut last = derive_zoom(vp.region().lng_delta).unwrap();
        for _ in 0..20 {
            vp.zoom_in();
            let z = derive_zoom(vp.region().lng_delta).unwrap();
            assert!(z >= last);
            last = z;
        }
    }

    #[test]
    fn test_fit_contains_region() {
        let mut vp = Viewport::home(200, 100);
        let target = MapRegion::new(37.005, -78.005, 0.0125, 0.0125);
        vp.fit(&target);
        let bbox = target.bbox();
        for (lon, lat) in [(bbox.west, bbox.north), (bbox.east, bbox.south)] {
            let (px, py) = vp.project(lon, lat);
            assert!((-1..=200).contains(&px) && (-1..=100).contains(&py), "{px},{py}");
        }
    }
}
