use crate::catalog::WineryId;
use thiserror::Error;

/// Failures while loading the static winery catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Catalog root must be a FeatureCollection")]
    NotACollection,

    #[error("Feature #{index} is missing `{field}`")]
    MissingProperty { index: usize, field: &'static str },

    #[error("Duplicate winery id {0}")]
    DuplicateId(WineryId),
}

/// Failures talking to the status backend.
/// At fetch time every variant means "status unknown" and is recovered
/// by defaulting flags.
#[derive(Error, Debug)]
pub enum StatusError {
    #[error("Status backend unavailable: {0}")]
    Unavailable(String),

    #[error("No signed-in user")]
    Unauthenticated,

    #[error("Status store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Status store is malformed: {0}")]
    Decode(#[from] simd_json::Error),

    #[error("Unknown winery {0}")]
    UnknownWinery(WineryId),

    #[error("Unknown wishlist entry {0}")]
    UnknownWishlistEntry(String),
}

/// Viewport queries the cluster index refuses to answer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Longitude span {0} is not a positive finite number")]
    InvalidSpan(f64),

    #[error("Bounding box contains non-finite coordinates")]
    InvalidBounds,

    #[error("Unknown cluster {0}")]
    UnknownCluster(u64),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Not signed in")]
    SignedOut,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    #[error("Location permission denied")]
    Denied,

    #[error("Location unavailable: {0}")]
    Unavailable(String),
}
