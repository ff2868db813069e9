use super::grid::PointGrid;
use super::region::BoundingBox;
use crate::catalog::WineryId;
use crate::error::QueryError;
use crate::geo::{lat_y, lng_x, project, unproject, wrap_lng, GeoPoint};
use crate::merge::EnrichedWinery;
use crate::status::StatusFlags;
use glam::DVec2;
use rayon::prelude::*;
use std::ops::AddAssign;
use std::time::Instant;
use tracing::{debug, warn};

/// Tile extent the pixel radius is measured against
const EXTENT: f64 = 512.0;

/// Highest zoom a cluster id can encode (5 bits, origin zoom is zoom + 1)
pub const MAX_SUPPORTED_ZOOM: u8 = 30;

/// Marks a node not yet absorbed at any zoom
const UNVISITED: u8 = u8::MAX;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClusterOptions {
    /// Clustering radius in tile pixels
    pub radius: f64,
    /// Lowest zoom with its own level
    pub min_zoom: u8,
    /// Zoom at and above which every feature is a singleton
    pub max_zoom: u8,
    /// Smallest group that becomes a cluster
    pub min_points: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            radius: 40.0,
            min_zoom: 0,
            max_zoom: 16,
            min_points: 2,
        }
    }
}

/// Cluster handle. Encodes the index of the seed point and the zoom of
/// the level it was built from, so children are found without a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClusterId(u64);

impl ClusterId {
    fn new(origin_idx: usize, origin_zoom: u8) -> Self {
        Self(((origin_idx as u64) << 5) | origin_zoom as u64)
    }

    fn origin_idx(self) -> usize {
        (self.0 >> 5) as usize
    }

    fn origin_zoom(self) -> u8 {
        (self.0 & 31) as u8
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// Status badge counts aggregated over a cluster's leaves
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub visited: u32,
    pub favorites: u32,
    pub wishlist: u32,
}

impl StatusSummary {
    fn of(status: &StatusFlags) -> Self {
        Self {
            visited: status.visited as u32,
            favorites: status.is_favorite as u32,
            wishlist: status.is_want_to_visit as u32,
        }
    }
}

impl AddAssign for StatusSummary {
    fn add_assign(&mut self, other: Self) {
        self.visited += other.visited;
        self.favorites += other.favorites;
        self.wishlist += other.wishlist;
    }
}

/// Index input: one winery as a point with its display properties
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialFeature {
    pub id: WineryId,
    pub name: String,
    pub status: StatusFlags,
    pub position: GeoPoint,
}

impl From<&EnrichedWinery> for SpatialFeature {
    fn from(winery: &EnrichedWinery) -> Self {
        Self {
            id: winery.record.id.clone(),
            name: winery.record.name.clone(),
            status: winery.status.clone(),
            position: GeoPoint::new(winery.record.latitude, winery.record.longitude),
        }
    }
}

/// Synthetic aggregate marker
#[derive(Clone, Debug, PartialEq)]
pub struct Cluster {
    pub id: ClusterId,
    pub point_count: usize,
    /// Point-count-weighted centroid of the members
    pub position: GeoPoint,
    pub summary: StatusSummary,
}

/// One marker of a query result
#[derive(Clone, Debug, PartialEq)]
pub enum ClusterOrPoint {
    Point(SpatialFeature),
    Cluster(Cluster),
}

impl ClusterOrPoint {
    pub fn position(&self) -> GeoPoint {
        match self {
            ClusterOrPoint::Point(f) => f.position,
            ClusterOrPoint::Cluster(c) => c.position,
        }
    }

    /// Number of wineries this marker stands for
    pub fn point_count(&self) -> usize {
        match self {
            ClusterOrPoint::Point(_) => 1,
            ClusterOrPoint::Cluster(c) => c.point_count,
        }
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self, ClusterOrPoint::Cluster(_))
    }
}

#[derive(Clone, Copy, Debug)]
enum NodeKind {
    Leaf(usize),
    Cluster(ClusterId),
}

#[derive(Clone, Debug)]
struct Node {
    pos: DVec2,
    /// Lowest zoom this node has been visited at
    zoom: u8,
    kind: NodeKind,
    parent: Option<ClusterId>,
    num_points: usize,
    summary: StatusSummary,
}

impl Node {
    fn carried(&self) -> Node {
        Node {
            zoom: UNVISITED,
            parent: None,
            ..self.clone()
        }
    }
}

struct Level {
    nodes: Vec<Node>,
    grid: PointGrid,
}

/// Hierarchical greedy clustering index over winery points.
///
/// Level `max_zoom` holds the leaves. Each lower level is built from the
/// one above: nodes are visited in index order, and the first unvisited
/// node absorbs every unvisited neighbor within the zoom's radius. The
/// earliest catalog entry therefore seeds a cluster; its position is the
/// count-weighted mean of member positions in Mercator space.
///
/// Built once per feature set; queries are read-only.
pub struct ClusterIndex {
    options: ClusterOptions,
    leaves: Vec<SpatialFeature>,
    excluded: Vec<WineryId>,
    /// `levels[z - min_zoom]`
    levels: Vec<Level>,
}

impl ClusterIndex {
    pub fn from_wineries(wineries: &[EnrichedWinery], options: ClusterOptions) -> Self {
        Self::build(wineries.iter().map(SpatialFeature::from).collect(), options)
    }

    pub fn build(features: Vec<SpatialFeature>, options: ClusterOptions) -> Self {
        let started = Instant::now();
        let options = sanitize(options);
        let input = features.len();

        let (leaves, excluded): (Vec<_>, Vec<_>) = features.into_iter().partition(|f| f.position.is_finite());
        let excluded: Vec<WineryId> = excluded.into_iter().map(|f| f.id).collect();
        if !excluded.is_empty() {
            warn!(count = excluded.len(), ids = ?excluded, "excluded features with non-finite coordinates");
        }

        let positions: Vec<DVec2> = leaves.par_iter().map(|f| project(f.position)).collect();
        let nodes: Vec<Node> = positions
            .iter()
            .zip(&leaves)
            .enumerate()
            .map(|(i, (&pos, feature))| Node {
                pos,
                zoom: UNVISITED,
                kind: NodeKind::Leaf(i),
                parent: None,
                num_points: 1,
                summary: StatusSummary::of(&feature.status),
            })
            .collect();

        let mut index = Self {
            options,
            leaves,
            excluded,
            levels: Vec::with_capacity((options.max_zoom - options.min_zoom) as usize + 1),
        };

        let mut current = index.level(nodes, options.max_zoom);
        for zoom in (options.min_zoom..options.max_zoom).rev() {
            let next_nodes = index.cluster(&mut current, zoom);
            let next = index.level(next_nodes, zoom);
            index.levels.push(current);
            current = next;
        }
        index.levels.push(current);
        index.levels.reverse();

        debug!(
            input,
            indexed = index.leaves.len(),
            excluded = index.excluded.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "cluster index built"
        );
        index
    }

    /// Search radius in projected units when clustering into `zoom`
    #[inline(always)]
    fn radius_at(&self, zoom: u8) -> f64 {
        self.options.radius / (EXTENT * 2f64.powi(zoom as i32))
    }

    /// Wrap nodes with a grid sized to the radius they are searched with
    fn level(&self, nodes: Vec<Node>, zoom: u8) -> Level {
        let cell = self.radius_at(zoom.saturating_sub(1).max(self.options.min_zoom));
        let grid = PointGrid::build(nodes.iter().map(|n| n.pos).collect(), cell);
        Level { nodes, grid }
    }

    /// Collapse `level` (zoom + 1) into the nodes of `zoom`
    fn cluster(&self, level: &mut Level, zoom: u8) -> Vec<Node> {
        let r = self.radius_at(zoom);
        let min_points = self.options.min_points;
        let Level { nodes, grid } = level;
        let mut next = Vec::new();

        for i in 0..nodes.len() {
            if nodes[i].zoom <= zoom {
                continue;
            }
            nodes[i].zoom = zoom;

            let origin_pos = nodes[i].pos;
            let origin_points = nodes[i].num_points;
            let neighbors = grid.within(origin_pos, r);

            let num_points = origin_points
                + neighbors
                    .iter()
                    .filter(|&&n| nodes[n].zoom > zoom)
                    .map(|&n| nodes[n].num_points)
                    .sum::<usize>();

            if num_points > origin_points && num_points >= min_points {
                let id = ClusterId::new(i, zoom + 1);
                let mut weighted = origin_pos * origin_points as f64;
                let mut summary = nodes[i].summary;

                for &n in &neighbors {
                    let node = &mut nodes[n];
                    if node.zoom <= zoom {
                        continue;
                    }
                    node.zoom = zoom;
                    node.parent = Some(id);
                    weighted += node.pos * node.num_points as f64;
                    summary += node.summary;
                }
                nodes[i].parent = Some(id);

                next.push(Node {
                    pos: weighted / num_points as f64,
                    zoom: UNVISITED,
                    kind: NodeKind::Cluster(id),
                    parent: None,
                    num_points,
                    summary,
                });
            } else {
                next.push(nodes[i].carried());

                if num_points > 1 {
                    for &n in &neighbors {
                        if nodes[n].zoom <= zoom {
                            continue;
                        }
                        nodes[n].zoom = zoom;
                        next.push(nodes[n].carried());
                    }
                }
            }
        }

        next
    }

    fn level_at(&self, zoom: u8) -> Option<&Level> {
        let idx = zoom.checked_sub(self.options.min_zoom)?;
        self.levels.get(idx as usize)
    }

    fn clamp_zoom(&self, zoom: i32) -> u8 {
        zoom.clamp(self.options.min_zoom as i32, self.options.max_zoom as i32) as u8
    }

    fn marker(&self, node: &Node) -> ClusterOrPoint {
        match node.kind {
            NodeKind::Leaf(i) => ClusterOrPoint::Point(self.leaves[i].clone()),
            NodeKind::Cluster(id) => ClusterOrPoint::Cluster(Cluster {
                id,
                point_count: node.num_points,
                position: unproject(node.pos),
                summary: node.summary,
            }),
        }
    }

    /// Markers inside `bbox` at `zoom`. Zoom is clamped to the index
    /// range; longitudes wrap, and boxes spanning the antimeridian are
    /// split in two.
    pub fn get_clusters(&self, bbox: BoundingBox, zoom: i32) -> Result<Vec<ClusterOrPoint>, QueryError> {
        if !bbox.is_finite() {
            return Err(QueryError::InvalidBounds);
        }

        let mut min_lng = wrap_lng(bbox.west);
        let mut max_lng = if bbox.east == 180.0 { 180.0 } else { wrap_lng(bbox.east) };
        let min_lat = bbox.south.clamp(-90.0, 90.0);
        let max_lat = bbox.north.clamp(-90.0, 90.0);

        if bbox.east - bbox.west >= 360.0 {
            min_lng = -180.0;
            max_lng = 180.0;
        } else if min_lng > max_lng {
            let mut eastern = self.get_clusters(
                BoundingBox {
                    west: min_lng,
                    south: min_lat,
                    east: 180.0,
                    north: max_lat,
                },
                zoom,
            )?;
            let western = self.get_clusters(
                BoundingBox {
                    west: -180.0,
                    south: min_lat,
                    east: max_lng,
                    north: max_lat,
                },
                zoom,
            )?;
            eastern.extend(western);
            return Ok(eastern);
        }

        let Some(level) = self.level_at(self.clamp_zoom(zoom)) else {
            return Ok(Vec::new());
        };
        let hits = level.grid.range(
            DVec2::new(lng_x(min_lng), lat_y(max_lat)),
            DVec2::new(lng_x(max_lng), lat_y(min_lat)),
        );
        Ok(hits.into_iter().map(|i| self.marker(&level.nodes[i])).collect())
    }

    /// Immediate members of a cluster, one zoom level down
    pub fn get_children(&self, id: ClusterId) -> Result<Vec<ClusterOrPoint>, QueryError> {
        let unknown = || QueryError::UnknownCluster(id.raw());
        let origin_zoom = id.origin_zoom();
        if origin_zoom <= self.options.min_zoom {
            return Err(unknown());
        }
        let level = self.level_at(origin_zoom).ok_or_else(unknown)?;
        let origin = level.nodes.get(id.origin_idx()).ok_or_else(unknown)?;

        let r = self.radius_at(origin_zoom - 1);
        let children: Vec<ClusterOrPoint> = level
            .grid
            .within(origin.pos, r)
            .into_iter()
            .filter(|&n| level.nodes[n].parent == Some(id))
            .map(|n| self.marker(&level.nodes[n]))
            .collect();

        if children.is_empty() {
            return Err(unknown());
        }
        Ok(children)
    }

    /// Up to `limit` leaf wineries of a cluster, skipping the first `offset`
    pub fn get_leaves(&self, id: ClusterId, limit: usize, offset: usize) -> Result<Vec<SpatialFeature>, QueryError> {
        let mut leaves = Vec::new();
        if limit > 0 {
            self.append_leaves(&mut leaves, id, limit, offset, 0)?;
        }
        Ok(leaves)
    }

    fn append_leaves(
        &self,
        out: &mut Vec<SpatialFeature>,
        id: ClusterId,
        limit: usize,
        offset: usize,
        mut skipped: usize,
    ) -> Result<usize, QueryError> {
        for child in self.get_children(id)? {
            match child {
                ClusterOrPoint::Cluster(c) => {
                    if skipped + c.point_count <= offset {
                        skipped += c.point_count;
                    } else {
                        skipped = self.append_leaves(out, c.id, limit, offset, skipped)?;
                    }
                }
                ClusterOrPoint::Point(f) => {
                    if skipped < offset {
                        skipped += 1;
                    } else {
                        out.push(f);
                    }
                }
            }
            if out.len() == limit {
                break;
            }
        }
        Ok(skipped)
    }

    /// Lowest zoom at which the cluster splits into more than one marker
    pub fn expansion_zoom(&self, id: ClusterId) -> Result<u8, QueryError> {
        let mut zoom = id.origin_zoom().saturating_sub(1);
        let mut id = id;
        while zoom <= self.options.max_zoom {
            let children = self.get_children(id)?;
            zoom += 1;
            match children.as_slice() {
                [ClusterOrPoint::Cluster(only)] => id = only.id,
                _ => break,
            }
        }
        Ok(zoom)
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    /// Number of indexed (finite) features
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Features dropped for non-finite coordinates
    pub fn excluded(&self) -> &[WineryId] {
        &self.excluded
    }
}

fn sanitize(mut options: ClusterOptions) -> ClusterOptions {
    if !options.radius.is_finite() || options.radius <= 0.0 {
        options.radius = ClusterOptions::default().radius;
    }
    options.max_zoom = options.max_zoom.min(MAX_SUPPORTED_ZOOM);
    options.min_zoom = options.min_zoom.min(options.max_zoom);
    options.min_points = options.min_points.max(2);
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::region::derive_zoom;
    use pretty_assertions::assert_eq;

    fn feature(id: &str, lat: f64, lng: f64) -> SpatialFeature {
        SpatialFeature {
            id: WineryId::from(id),
            name: format!("Winery {id}"),
            status: StatusFlags::default(),
            position: GeoPoint::new(lat, lng),
        }
    }

    fn three() -> ClusterIndex {
        ClusterIndex::build(
            vec![
                feature("a", 37.0, -78.0),
                feature("b", 37.01, -78.01),
                feature("c", 40.0, -80.0),
            ],
            ClusterOptions::default(),
        )
    }

    fn clusters(markers: &[ClusterOrPoint]) -> Vec<&Cluster> {
        markers
            .iter()
            .filter_map(|m| match m {
                ClusterOrPoint::Cluster(c) => Some(c),
                ClusterOrPoint::Point(_) => None,
            })
            .collect()
    }

    fn point_ids(markers: &[ClusterOrPoint]) -> Vec<&str> {
        let mut ids: Vec<&str> = markers
            .iter()
            .filter_map(|m| match m {
                ClusterOrPoint::Point(f) => Some(f.id.as_str()),
                ClusterOrPoint::Cluster(_) => None,
            })
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_close_pair_clusters_at_low_zoom() {
        let index = three();
        let zoom = derive_zoom(5.0).unwrap();
        let markers = index.get_clusters(BoundingBox::WORLD, zoom).unwrap();

        let found = clusters(&markers);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].point_count, 2);
        assert_eq!(point_ids(&markers), vec!["c"]);

        // Centroid sits between the two members
        let p = found[0].position;
        assert!(p.lat > 37.0 && p.lat < 37.01);
        assert!(p.lng < -78.0 && p.lng > -78.01);
    }

    #[test]
    fn test_everything_singleton_when_zoomed_in() {
        let index = three();
        let zoom = derive_zoom(0.01).unwrap();
        let markers = index.get_clusters(BoundingBox::WORLD, zoom).unwrap();
        assert_eq!(point_ids(&markers), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_max_zoom_and_beyond_are_leaves() {
        let index = three();
        for zoom in [16, 17, 40] {
            let markers = index.get_clusters(BoundingBox::WORLD, zoom).unwrap();
            assert_eq!(markers.len(), 3);
            assert!(markers.iter().all(|m| !m.is_cluster()));
        }
    }

    #[test]
    fn test_identical_points_split_at_max_zoom() {
        let index = ClusterIndex::build(
            vec![feature("x", 38.0, -78.0), feature("y", 38.0, -78.0)],
            ClusterOptions::default(),
        );
        assert_eq!(index.get_clusters(BoundingBox::WORLD, 15).unwrap().len(), 1);
        assert_eq!(index.get_clusters(BoundingBox::WORLD, 16).unwrap().len(), 2);
    }

    #[test]
    fn test_bbox_filters_markers() {
        let index = three();
        let bbox = BoundingBox {
            west: -81.0,
            south: 39.0,
            east: -79.0,
            north: 41.0,
        };
        let markers = index.get_clusters(bbox, 14).unwrap();
        assert_eq!(point_ids(&markers), vec!["c"]);
    }

    #[test]
    fn test_antimeridian_split() {
        let index = ClusterIndex::build(
            vec![
                feature("east", 0.0, 179.5),
                feature("west", 0.0, -179.5),
                feature("far", 0.0, 0.0),
            ],
            ClusterOptions::default(),
        );
        let bbox = BoundingBox {
            west: 179.0,
            south: -1.0,
            east: 181.0,
            north: 1.0,
        };
        let markers = index.get_clusters(bbox, 16).unwrap();
        assert_eq!(point_ids(&markers), vec!["east", "west"]);
    }

    #[test]
    fn test_children_leaves_and_expansion() {
        let index = three();
        let markers = index.get_clusters(BoundingBox::WORLD, 5).unwrap();
        let cluster = clusters(&markers)[0].clone();

        let children = index.get_children(cluster.id).unwrap();
        assert_eq!(children.iter().map(ClusterOrPoint::point_count).sum::<usize>(), 2);

        let mut leaves: Vec<_> = index
            .get_leaves(cluster.id, 100, 0)
            .unwrap()
            .into_iter()
            .map(|f| f.id.0)
            .collect();
        leaves.sort();
        assert_eq!(leaves, vec!["a", "b"]);

        assert_eq!(index.get_leaves(cluster.id, 1, 0).unwrap().len(), 1);
        assert_eq!(index.get_leaves(cluster.id, 10, 1).unwrap().len(), 1);

        let zoom = index.expansion_zoom(cluster.id).unwrap();
        let split = index.get_clusters(BoundingBox::WORLD, zoom as i32).unwrap();
        assert!(clusters(&split).is_empty(), "still clustered at {zoom}");
        let before = index.get_clusters(BoundingBox::WORLD, zoom as i32 - 1).unwrap();
        assert_eq!(clusters(&before).len(), 1);
    }

    #[test]
    fn test_unknown_cluster_rejected() {
        let index = three();
        let bogus = ClusterId::new(999, 9);
        assert_eq!(index.get_children(bogus), Err(QueryError::UnknownCluster(bogus.raw())));
        assert!(index.get_leaves(bogus, 10, 0).is_err());
    }

    #[test]
    fn test_non_finite_coordinates_excluded() {
        let index = ClusterIndex::build(
            vec![feature("ok", 37.0, -78.0), feature("bad", f64::NAN, -78.0), feature("worse", 37.0, f64::INFINITY)],
            ClusterOptions::default(),
        );
        assert_eq!(index.len(), 1);
        let excluded: Vec<_> = index.excluded().iter().map(|id| id.as_str()).collect();
        assert_eq!(excluded, vec!["bad", "worse"]);
        assert_eq!(index.get_clusters(BoundingBox::WORLD, 0).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_bbox_is_an_error() {
        let bbox = BoundingBox {
            west: f64::NAN,
            ..BoundingBox::WORLD
        };
        assert_eq!(three().get_clusters(bbox, 3), Err(QueryError::InvalidBounds));
    }

    #[test]
    fn test_summary_counts_badges() {
        let mut fav = feature("fav", 37.0, -78.0);
        fav.status.is_favorite = true;
        let mut seen = feature("seen", 37.001, -78.001);
        seen.status.visited = true;
        let index = ClusterIndex::build(vec![fav, seen], ClusterOptions::default());

        let markers = index.get_clusters(BoundingBox::WORLD, 2).unwrap();
        let cluster = clusters(&markers)[0];
        assert_eq!(
            cluster.summary,
            StatusSummary {
                visited: 1,
                favorites: 1,
                wishlist: 0,
            }
        );
    }

    #[test]
    fn test_empty_index() {
        let index = ClusterIndex::build(Vec::new(), ClusterOptions::default());
        assert!(index.is_empty());
        assert!(index.get_clusters(BoundingBox::WORLD, 4).unwrap().is_empty());
    }
}
