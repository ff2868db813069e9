mod basemap;
mod geometry;
mod projection;
mod renderer;

pub use basemap::{fallback_outline, load_basemap, load_or_fallback};
pub use projection::Viewport;
pub use renderer::{hit_test, marker_hits, Label, LabelKind, LineString, MapLayers, MapRenderer, MarkerHit, MarkerTarget};
