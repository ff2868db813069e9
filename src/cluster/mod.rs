mod grid;
mod index;
mod region;

pub use grid::PointGrid;
pub use index::{
    Cluster, ClusterId, ClusterIndex, ClusterOptions, ClusterOrPoint, SpatialFeature, StatusSummary,
    MAX_SUPPORTED_ZOOM,
};
pub use region::{derive_zoom, span_for_zoom, BoundingBox, MapRegion};
