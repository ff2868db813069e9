use crate::braille::BrailleCanvas;
use crate::catalog::WineryId;
use crate::cluster::{ClusterId, ClusterOrPoint, SpatialFeature};
use crate::map::geometry::{draw_disc, draw_line};
use crate::map::projection::Viewport;

/// A geographic line (sequence of lon/lat coordinates)
pub type LineString = Vec<(f64, f64)>;

/// Point markers get their name beside them below this many markers
const NAME_LABEL_LIMIT: usize = 40;

/// Longest winery name drawn on the map
const MAX_NAME_LEN: usize = 24;

/// What a marker on screen stands for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkerTarget {
    Cluster(ClusterId),
    Winery(WineryId),
}

/// Character cell occupied by a marker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkerHit {
    pub col: u16,
    pub row: u16,
    pub target: MarkerTarget,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelKind {
    Count,
    Favorite,
    Visited,
    Wishlist,
    Winery,
    Name,
}

impl LabelKind {
    /// Glyph and kind for a winery marker; favorite wins over visited over wishlist
    fn for_winery(feature: &SpatialFeature) -> (char, Self) {
        let status = &feature.status;
        if status.is_favorite {
            ('♥', LabelKind::Favorite)
        } else if status.visited {
            ('✓', LabelKind::Visited)
        } else if status.is_want_to_visit {
            ('★', LabelKind::Wishlist)
        } else {
            ('●', LabelKind::Winery)
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Label {
    pub col: u16,
    pub row: u16,
    pub text: String,
    pub kind: LabelKind,
}

/// Rendered layers, back to front
pub struct MapLayers {
    pub basemap: BrailleCanvas,
    pub clusters: BrailleCanvas,
    pub labels: Vec<Label>,
    pub hits: Vec<MarkerHit>,
}

#[derive(Clone, Debug)]
pub struct DisplaySettings {
    pub show_basemap: bool,
    pub show_labels: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_basemap: true,
            show_labels: true,
        }
    }
}

/// Draws the basemap and a frame's markers onto Braille layers
#[derive(Default)]
pub struct MapRenderer {
    basemap: Vec<LineString>,
    pub settings: DisplaySettings,
}

impl MapRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_line(&mut self, line: LineString) {
        if line.len() >= 2 {
            self.basemap.push(line);
        }
    }

    pub fn has_data(&self) -> bool {
        !self.basemap.is_empty()
    }

    pub fn toggle_labels(&mut self) {
        self.settings.show_labels = !self.settings.show_labels;
    }

    pub fn toggle_basemap(&mut self) {
        self.settings.show_basemap = !self.settings.show_basemap;
    }

    /// Render `markers` into a `cols` x `rows` character area. The
    /// viewport must be sized in dots (`cols*2` x `rows*4`).
    pub fn render(&self, cols: usize, rows: usize, viewport: &Viewport, markers: &[ClusterOrPoint]) -> MapLayers {
        let mut basemap = BrailleCanvas::new(cols, rows);
        if self.settings.show_basemap {
            for line in &self.basemap {
                draw_linestring(&mut basemap, line, viewport);
            }
        }

        let mut clusters = BrailleCanvas::new(cols, rows);
        let mut labels = Vec::new();
        let show_names = self.settings.show_labels && markers.len() <= NAME_LABEL_LIMIT;

        for marker in markers {
            let position = marker.position();
            let (px, py) = viewport.project(position.lng, position.lat);
            if !viewport.is_visible(px, py) {
                continue;
            }
            let (col, row) = ((px / 2) as u16, (py / 4) as u16);

            match marker {
                ClusterOrPoint::Cluster(cluster) => {
                    draw_disc(&mut clusters, (px, py), cluster_radius(cluster.point_count), false);
                    let text = cluster.point_count.to_string();
                    let half = (text.chars().count() / 2) as u16;
                    labels.push(Label {
                        col: col.saturating_sub(half),
                        row,
                        text,
                        kind: LabelKind::Count,
                    });
                }
                ClusterOrPoint::Point(feature) => {
                    let (glyph, kind) = LabelKind::for_winery(feature);
                    labels.push(Label {
                        col,
                        row,
                        text: glyph.to_string(),
                        kind,
                    });
                    if show_names {
                        labels.push(Label {
                            col: col.saturating_add(2),
                            row,
                            text: feature.name.chars().take(MAX_NAME_LEN).collect(),
                            kind: LabelKind::Name,
                        });
                    }
                }
            }
        }

        MapLayers {
            basemap,
            clusters,
            labels,
            hits: marker_hits(viewport, markers),
        }
    }
}

/// Dot radius of a cluster ring, growing with the count's magnitude
fn cluster_radius(point_count: usize) -> i32 {
    match point_count {
        0..=9 => 3,
        10..=99 => 4,
        _ => 5,
    }
}

/// Draw a linestring with viewport culling
fn draw_linestring(canvas: &mut BrailleCanvas, line: &LineString, viewport: &Viewport) {
    let mut prev: Option<(i32, i32)> = None;
    for &(lon, lat) in line {
        let point = viewport.project(lon, lat);
        if let Some(last) = prev {
            // Long jumps are antimeridian wraps, not real segments
            let dist = ((point.0 - last.0).abs() + (point.1 - last.1).abs()) as usize;
            if dist < viewport.width && viewport.line_might_be_visible(last, point) {
                draw_line(canvas, last, point);
            }
        }
        prev = Some(point);
    }
}

/// Character cells of every on-screen marker
pub fn marker_hits(viewport: &Viewport, markers: &[ClusterOrPoint]) -> Vec<MarkerHit> {
    markers
        .iter()
        .filter_map(|marker| {
            let position = marker.position();
            let (px, py) = viewport.project(position.lng, position.lat);
            if !viewport.is_visible(px, py) {
                return None;
            }
            let target = match marker {
                ClusterOrPoint::Cluster(c) => MarkerTarget::Cluster(c.id),
                ClusterOrPoint::Point(f) => MarkerTarget::Winery(f.id.clone()),
            };
            Some(MarkerHit {
                col: (px / 2) as u16,
                row: (py / 4) as u16,
                target,
            })
        })
        .collect()
}

/// Marker nearest to a clicked cell, at most one cell away
pub fn hit_test(hits: &[MarkerHit], col: u16, row: u16) -> Option<&MarkerHit> {
    hits.iter()
        .map(|hit| (hit.col.abs_diff(col).max(hit.row.abs_diff(row)), hit))
        .filter(|(distance, _)| *distance <= 1)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, hit)| hit)
}
