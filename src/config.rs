use crate::cluster::{ClusterOptions, MAX_SUPPORTED_ZOOM};
use crate::error::ConfigError;
use crate::geo::GeoPoint;
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Runtime settings, read from the environment
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub catalog_path: Option<PathBuf>,
    pub basemap_path: PathBuf,
    pub status_path: Option<PathBuf>,
    pub user_id: Option<String>,
    pub cluster: ClusterOptions,
    pub leaf_limit: usize,
    pub status_timeout: Duration,
    pub home: Option<GeoPoint>,
    pub log_path: PathBuf,
    /// Tunables left unset, for logging once the subscriber is up
    pub defaulted: Vec<&'static str>,
}

const TUNABLE_KEYS: [&str; 5] = [
    "WINERY_CLUSTER_MIN_ZOOM",
    "WINERY_CLUSTER_MAX_ZOOM",
    "WINERY_CLUSTER_RADIUS",
    "WINERY_LEAF_LIMIT",
    "WINERY_STATUS_TIMEOUT_MS",
];

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let min_zoom: u8 = try_load(&lookup, "WINERY_CLUSTER_MIN_ZOOM", "0")?;
        let max_zoom: u8 = try_load(&lookup, "WINERY_CLUSTER_MAX_ZOOM", "16")?;
        if max_zoom > MAX_SUPPORTED_ZOOM {
            return Err(invalid("WINERY_CLUSTER_MAX_ZOOM", format!("must be at most {MAX_SUPPORTED_ZOOM}")));
        }
        if min_zoom > max_zoom {
            return Err(invalid("WINERY_CLUSTER_MIN_ZOOM", "must not exceed the max zoom"));
        }

        let radius: f64 = try_load(&lookup, "WINERY_CLUSTER_RADIUS", "40")?;
        if !radius.is_finite() || radius <= 0.0 {
            return Err(invalid("WINERY_CLUSTER_RADIUS", "must be a positive number"));
        }

        let leaf_limit: usize = try_load(&lookup, "WINERY_LEAF_LIMIT", "100")?;
        if leaf_limit == 0 {
            return Err(invalid("WINERY_LEAF_LIMIT", "must be at least 1"));
        }

        let timeout_ms: u64 = try_load(&lookup, "WINERY_STATUS_TIMEOUT_MS", "3000")?;

        let home = lookup("WINERY_HOME").map(|raw| parse_lat_lng(&raw)).transpose()?;
        let defaulted = TUNABLE_KEYS.into_iter().filter(|key| lookup(key).is_none()).collect();

        Ok(Self {
            catalog_path: lookup("WINERY_CATALOG").map(PathBuf::from),
            basemap_path: lookup("WINERY_BASEMAP")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/basemap.json")),
            status_path: lookup("WINERY_STATUS_FILE").map(PathBuf::from),
            user_id: Some(lookup("WINERY_USER").unwrap_or_else(|| "local".to_string())),
            cluster: ClusterOptions {
                radius,
                min_zoom,
                max_zoom,
                ..ClusterOptions::default()
            },
            leaf_limit,
            status_timeout: Duration::from_millis(timeout_ms),
            home,
            log_path: lookup("WINERY_LOG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("winery-map.log")),
            defaulted,
        })
    }
}

fn invalid(key: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        message: message.into(),
    }
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, e.to_string()))
}

/// `"lat,lng"` in degrees
fn parse_lat_lng(raw: &str) -> Result<GeoPoint, ConfigError> {
    let bad = || invalid("WINERY_HOME", format!("expected `lat,lng`, got `{raw}`"));
    let (lat, lng) = raw.split_once(',').ok_or_else(bad)?;
    let lat: f64 = lat.trim().parse().map_err(|_| bad())?;
    let lng: f64 = lng.trim().parse().map_err(|_| bad())?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(bad());
    }
    Ok(GeoPoint::new(lat, lng))
}
