use crate::error::QueryError;
use crate::geo::GeoPoint;

/// Visible map region: center plus angular spans in degrees
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapRegion {
    pub center_lat: f64,
    pub center_lng: f64,
    pub lat_delta: f64,
    pub lng_delta: f64,
}

/// `[west, south, east, north]` in degrees
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub const WORLD: BoundingBox = BoundingBox {
        west: -180.0,
        south: -90.0,
        east: 180.0,
        north: 90.0,
    };

    pub fn is_finite(&self) -> bool {
        self.west.is_finite() && self.south.is_finite() && self.east.is_finite() && self.north.is_finite()
    }

    /// Unwrapped containment test (no antimeridian handling)
    pub fn contains(&self, p: GeoPoint) -> bool {
        p.lng >= self.west && p.lng <= self.east && p.lat >= self.south && p.lat <= self.north
    }

    /// Smallest box around the given points
    pub fn around(points: impl IntoIterator<Item = GeoPoint>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => BoundingBox {
                    west: p.lng,
                    south: p.lat,
                    east: p.lng,
                    north: p.lat,
                },
                Some(b) => BoundingBox {
                    west: b.west.min(p.lng),
                    south: b.south.min(p.lat),
                    east: b.east.max(p.lng),
                    north: b.north.max(p.lat),
                },
            })
        })
    }
}

impl MapRegion {
    pub fn new(center_lat: f64, center_lng: f64, lat_delta: f64, lng_delta: f64) -> Self {
        Self {
            center_lat,
            center_lng,
            lat_delta,
            lng_delta,
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox {
            west: self.center_lng - self.lng_delta / 2.0,
            south: self.center_lat - self.lat_delta / 2.0,
            east: self.center_lng + self.lng_delta / 2.0,
            north: self.center_lat + self.lat_delta / 2.0,
        }
    }

    /// Region showing `bbox` with a margin, never narrower than `min_delta`
    pub fn fit(bbox: BoundingBox, padding: f64, min_delta: f64) -> Self {
        let lat_delta = ((bbox.north - bbox.south) * (1.0 + padding)).max(min_delta);
        let lng_delta = ((bbox.east - bbox.west) * (1.0 + padding)).max(min_delta);
        Self {
            center_lat: (bbox.north + bbox.south) / 2.0,
            center_lng: (bbox.east + bbox.west) / 2.0,
            lat_delta,
            lng_delta,
        }
    }

    pub fn zoom(&self) -> Result<i32, QueryError> {
        derive_zoom(self.lng_delta)
    }
}

/// Integer zoom from a longitude span: `floor(log2(360 / lng_delta) - 1)`.
/// Narrower spans give higher zooms. Wider-than-world spans go negative;
/// the index clamps.
pub fn derive_zoom(lng_delta: f64) -> Result<i32, QueryError> {
    if !lng_delta.is_finite() || lng_delta <= 0.0 {
        return Err(QueryError::InvalidSpan(lng_delta));
    }
    Ok(((360.0 / lng_delta).log2() - 1.0).floor() as i32)
}

/// Widest longitude span that still derives `zoom`
pub fn span_for_zoom(zoom: u8) -> f64 {
    360.0 / 2f64.powi(zoom as i32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_for_zoom_round_trips() {
        for zoom in 0..=20u8 {
            assert_eq!(derive_zoom(span_for_zoom(zoom)), Ok(zoom as i32));
        }
    }

    #[test]
    fn test_bbox_from_center_and_deltas() {
        let region = MapRegion::new(38.0, -78.0, 2.0, 4.0);
        assert_eq!(
            region.bbox(),
            BoundingBox {
                west: -80.0,
                south: 37.0,
                east: -76.0,
                north: 39.0,
            }
        );
    }

    #[test]
    fn test_zoom_constants() {
        assert_eq!(derive_zoom(5.0), Ok(5));
        assert_eq!(derive_zoom(0.01), Ok(14));
        assert_eq!(derive_zoom(360.0), Ok(-1));
        assert_eq!(derive_zoom(180.0), Ok(0));
    }

    #[test]
    fn test_zoom_is_monotonic() {
        let spans = [720.0, 360.0, 90.0, 33.3, 5.0, 1.0, 0.2, 0.01, 0.0001];
        let zooms: Vec<i32> = spans.iter().map(|s| derive_zoom(*s).unwrap()).collect();
        assert!(zooms.windows(2).all(|w| w[0] <= w[1]), "{zooms:?}");
    }

    #[test]
    fn test_bad_spans_rejected() {
        assert!(derive_zoom(0.0).is_err());
        assert!(derive_zoom(-3.0).is_err());
        assert!(derive_zoom(f64::NAN).is_err());
        assert!(derive_zoom(f64::INFINITY).is_err());
    }

    #[test]
    fn test_fit_pads_and_floors() {
        let bbox = BoundingBox {
            west: -78.1,
            south: 37.0,
            east: -78.0,
            north: 37.0,
        };
        let region = MapRegion::fit(bbox, 0.5, 0.01);
        assert!((region.lng_delta - 0.15).abs() < 1e-9);
        assert_eq!(region.lat_delta, 0.01);
        assert!((region.center_lng + 78.05).abs() < 1e-9);
    }
}
