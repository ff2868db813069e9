use crate::error::CatalogError;
use geojson::{feature::Id, Feature, GeoJson, Value};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Stable winery identifier. Numeric ids from the source are stringified.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WineryId(pub String);

impl WineryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WineryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WineryId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A winery as it appears in the static catalog
#[derive(Clone, Debug, PartialEq)]
pub struct WineryRecord {
    pub id: WineryId,
    pub name: String,
    pub address: String,
    /// WGS-84 degrees
    pub latitude: f64,
    pub longitude: f64,
}

impl WineryRecord {
    pub fn new(id: &str, name: &str, address: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            id: WineryId::new(id),
            name: name.to_string(),
            address: address.to_string(),
            latitude,
            longitude,
        }
    }
}

/// Immutable, loaded-once list of wineries. Shared as `Arc<Catalog>`;
/// the pointer identity is what downstream memoization keys on.
#[derive(Debug)]
pub struct Catalog {
    records: Vec<WineryRecord>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate ids
    pub fn new(records: Vec<WineryRecord>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(&record.id) {
                return Err(CatalogError::DuplicateId(record.id.clone()));
            }
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[WineryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &WineryId) -> Option<&WineryRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    /// Load from a GeoJSON file, or the built-in sample when no path is given
    pub fn load(path: Option<&Path>) -> Result<Arc<Self>, CatalogError> {
        let catalog = match path {
            Some(path) => load_geojson(path)?,
            None => Self::builtin(),
        };
        info!(wineries = catalog.len(), "catalog loaded");
        Ok(Arc::new(catalog))
    }

    /// Small Virginia sample used when no catalog file is configured
    pub fn builtin() -> Self {
        let records = vec![
            WineryRecord::new("1", "Barboursville Vineyards", "17655 Winery Rd, Barboursville, VA", 38.1560, -78.2774),
            WineryRecord::new("2", "King Family Vineyards", "6550 Roseland Farm, Crozet, VA", 38.0717, -78.7008),
            WineryRecord::new("3", "Early Mountain Vineyards", "6109 Wolftown-Hood Rd, Madison, VA", 38.3528, -78.3165),
            WineryRecord::new("4", "Veritas Vineyard", "151 Veritas Ln, Afton, VA", 38.0153, -78.8454),
            WineryRecord::new("5", "Keswick Vineyards", "1575 Keswick Winery Dr, Keswick, VA", 38.0940, -78.3510),
            WineryRecord::new("6", "Jefferson Vineyards", "1353 Thomas Jefferson Pkwy, Charlottesville, VA", 37.9870, -78.4497),
            WineryRecord::new("7", "Blenheim Vineyards", "31 Blenheim Farm, Charlottesville, VA", 37.9301, -78.3773),
            WineryRecord::new("8", "Stinson Vineyards", "4744 Sugar Hollow Rd, Crozet, VA", 38.0854, -78.6887),
            WineryRecord::new("9", "Pippin Hill Farm", "5022 Plank Rd, North Garden, VA", 37.9624, -78.6412),
            WineryRecord::new("10", "Glass House Winery", "5898 Free Union Rd, Free Union, VA", 38.1371, -78.5722),
            WineryRecord::new("11", "RdV Vineyards", "2550 Delaplane Grade Rd, Delaplane, VA", 38.9101, -77.9394),
            WineryRecord::new("12", "Linden Vineyards", "3708 Harrels Corner Rd, Linden, VA", 38.9063, -78.0686),
            WineryRecord::new("13", "Boxwood Winery", "2042 Burrland Rd, Middleburg, VA", 38.9556, -77.7719),
            WineryRecord::new("14", "Breaux Vineyards", "36888 Breaux Vineyards Ln, Purcellville, VA", 39.2402, -77.7156),
            WineryRecord::new("15", "Chrysalis Vineyards", "39025 John Mosby Hwy, Middleburg, VA", 38.9712, -77.6945),
            WineryRecord::new("16", "Williamsburg Winery", "5800 Wessex Hundred, Williamsburg, VA", 37.2458, -76.7397),
            WineryRecord::new("17", "Chatham Vineyards", "9232 Chatham Rd, Machipongo, VA", 37.4036, -75.9156),
            WineryRecord::new("18", "Ankida Ridge Vineyards", "1304 Shoe Creek Rd, Amherst, VA", 37.5953, -79.1731),
            WineryRecord::new("19", "Rockbridge Vineyard", "35 Hill View Ln, Raphine, VA", 37.9225, -79.2205),
            WineryRecord::new("20", "Chateau Morrisette", "291 Winery Rd SW, Floyd, VA", 36.8553, -80.3867),
        ];
        Self { records }
    }
}

/// Read a GeoJSON FeatureCollection of winery points
pub fn load_geojson(path: &Path) -> Result<Catalog, CatalogError> {
    let content = fs::read_to_string(path)?;
    parse_geojson(&content)
}

/// Parse catalog GeoJSON text. Non-point features are skipped.
pub fn parse_geojson(content: &str) -> Result<Catalog, CatalogError> {
    let geojson: GeoJson = content.parse()?;
    let GeoJson::FeatureCollection(fc) = geojson else {
        return Err(CatalogError::NotACollection);
    };

    let mut records = Vec::with_capacity(fc.features.len());
    for (index, feature) in fc.features.iter().enumerate() {
        let Some((longitude, latitude)) = point_of(feature) else {
            warn!(index, "skipping non-point catalog feature");
            continue;
        };
        let id = feature_id(feature).ok_or(CatalogError::MissingProperty { index, field: "id" })?;
        let name = string_prop(feature, "name").ok_or(CatalogError::MissingProperty { index, field: "name" })?;
        let address = string_prop(feature, "address").unwrap_or_default();

        records.push(WineryRecord {
            id,
            name,
            address,
            latitude,
            longitude,
        });
    }

    Catalog::new(records)
}

fn point_of(feature: &Feature) -> Option<(f64, f64)> {
    match &feature.geometry.as_ref()?.value {
        Value::Point(coords) if coords.len() >= 2 => Some((coords[0], coords[1])),
        _ => None,
    }
}

/// `properties.id` wins over the feature-level `id` member
fn feature_id(feature: &Feature) -> Option<WineryId> {
    let from_props = feature.property("id").and_then(|v| {
        v.as_str()
            .map(str::to_string)
            .or_else(|| v.as_i64().map(|n| n.to_string()))
            .or_else(|| v.as_u64().map(|n| n.to_string()))
    });

    from_props
        .or_else(|| match &feature.id {
            Some(Id::String(s)) => Some(s.clone()),
            Some(Id::Number(n)) => Some(n.to_string()),
            None => None,
        })
        .map(WineryId)
}

fn string_prop(feature: &Feature, key: &str) -> Option<String> {
    feature.property(key).and_then(|v| v.as_str()).map(str::to_string)
}
