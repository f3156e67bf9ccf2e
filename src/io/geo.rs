//! GeoJSON shapefile ingest.
//!
//! Administrative boundaries are distributed as GeoJSON `FeatureCollection`s.
//! Each feature must name its area in `properties.region` and carry a
//! geometry object; coordinates are kept verbatim.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::Value;

use crate::domain::Region;
use crate::error::DataError;

const GEOMETRY_TYPES: [&str; 7] = [
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// Read a GeoJSON file into its regions.
pub fn read_shapefile(path: &Path) -> Result<Vec<Region>, DataError> {
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_reader(BufReader::new(file)).map_err(|e| DataError::GeoJson {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_feature_collection(&value).map_err(|message| DataError::GeoJson {
        path: path.to_path_buf(),
        message,
    })
}

pub fn parse_feature_collection(value: &Value) -> Result<Vec<Region>, String> {
    let features = value
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| "expected a FeatureCollection with a `features` array".to_string())?;

    features
        .iter()
        .enumerate()
        .map(|(idx, feature)| parse_feature(idx, feature))
        .collect()
}

fn parse_feature(idx: usize, feature: &Value) -> Result<Region, String> {
    let region = feature
        .get("properties")
        .and_then(|p| p.get("region"))
        .and_then(Value::as_str)
        .ok_or_else(|| format!("feature {idx}: missing `properties.region`"))?;

    let geometry = feature
        .get("geometry")
        .filter(|g| !g.is_null())
        .ok_or_else(|| format!("feature {idx}: missing `geometry`"))?;

    check_geometry(geometry).map_err(|e| format!("feature {idx} ({region}): {e}"))?;

    Ok(Region {
        region: region.to_string(),
        geometry: geometry.clone(),
    })
}

fn check_geometry(geometry: &Value) -> Result<(), String> {
    let kind = geometry
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| "geometry must be an object with a `type`".to_string())?;

    if !GEOMETRY_TYPES.contains(&kind) {
        return Err(format!("unknown geometry type '{kind}'"));
    }

    if kind == "GeometryCollection" {
        let parts = geometry
            .get("geometries")
            .and_then(Value::as_array)
            .ok_or_else(|| "GeometryCollection requires `geometries`".to_string())?;
        return parts.iter().try_for_each(check_geometry);
    }

    match geometry.get("coordinates") {
        Some(Value::Array(_)) => Ok(()),
        _ => Err(format!("{kind} requires a `coordinates` array")),
    }
}
