use crate::map::renderer::{LineString, MapRenderer};
use anyhow::{Context, Result};
use geojson::{GeoJson, Geometry, Value};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Load outline geometry from a GeoJSON file into the renderer, falling
/// back to a coarse built-in outline when the file is missing or bad.
pub fn load_or_fallback(renderer: &mut MapRenderer, path: &Path) {
    if path.exists() {
        match load_basemap(renderer, path) {
            Ok(lines) => {
                info!(lines, path = %path.display(), "basemap loaded");
                return;
            }
            Err(e) => warn!("basemap unusable, using built-in outline: {e:#}"),
        }
    }
    fallback_outline(renderer);
}

/// Add every line and polygon ring in a GeoJSON file; returns how many
pub fn load_basemap(renderer: &mut MapRenderer, path: &Path) -> Result<usize> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let geojson: GeoJson = content.parse().with_context(|| format!("parsing {}", path.display()))?;
    let mut count = 0;
    process_geojson_lines(&geojson, |line| {
        renderer.add_line(line);
        count += 1;
    });
    Ok(count)
}

fn process_geojson_lines<F>(geojson: &GeoJson, mut add_line: F)
where
    F: FnMut(LineString),
{
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for geometry in fc.features.iter().filter_map(|f| f.geometry.as_ref()) {
                process_geometry_lines(geometry, &mut add_line);
            }
        }
        GeoJson::Feature(f) => {
            if let Some(geometry) = &f.geometry {
                process_geometry_lines(geometry, &mut add_line);
            }
        }
        GeoJson::Geometry(geometry) => process_geometry_lines(geometry, &mut add_line),
    }
}

fn to_line(coords: &[Vec<f64>]) -> LineString {
    coords.iter().filter(|c| c.len() >= 2).map(|c| (c[0], c[1])).collect()
}

fn process_geometry_lines<F>(geometry: &Geometry, add_line: &mut F)
where
    F: FnMut(LineString),
{
    match &geometry.value {
        Value::LineString(coords) => add_line(to_line(coords)),
        Value::MultiLineString(lines) => lines.iter().for_each(|coords| add_line(to_line(coords))),
        // Every ring: lakes and islands read as outlines too
        Value::Polygon(rings) => rings.iter().for_each(|ring| add_line(to_line(ring))),
        Value::MultiPolygon(polygons) => polygons
            .iter()
            .flatten()
            .for_each(|ring| add_line(to_line(ring))),
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                process_geometry_lines(g, add_line);
            }
        }
        Value::Point(_) | Value::MultiPoint(_) => {}
    }
}

/// Rough Virginia border and Chesapeake shore
pub fn fallback_outline(renderer: &mut MapRenderer) {
    renderer.add_line(vec![
        (-83.68, 36.60), (-81.68, 36.59), (-79.51, 36.54), (-77.30, 36.54),
        (-75.87, 36.55), (-75.98, 36.91), (-76.30, 37.00), (-76.27, 37.52),
        (-76.43, 38.15), (-77.03, 38.44), (-77.32, 38.63), (-77.04, 38.83),
        (-77.12, 38.94), (-77.47, 39.08), (-77.72, 39.32), (-77.83, 39.13),
        (-78.34, 39.41), (-78.47, 39.52), (-78.82, 39.14), (-79.08, 38.70),
        (-79.49, 38.46), (-79.79, 38.27), (-80.05, 37.98), (-80.30, 37.52),
        (-80.86, 37.39), (-81.22, 37.24), (-81.68, 37.20), (-82.30, 36.92),
        (-82.91, 36.87), (-83.68, 36.60),
    ]);

    // Eastern Shore
    renderer.add_line(vec![
        (-75.24, 38.03), (-75.62, 37.99), (-75.96, 37.15), (-75.76, 37.12),
        (-75.59, 37.55), (-75.24, 38.03),
    ]);
}
