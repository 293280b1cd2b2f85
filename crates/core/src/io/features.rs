//! GeoJSON outlets in, GeoJSON lines out

use crate::error::{Error, Result};
use crate::vector::{Line, Outlet};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::fs;
use std::path::Path;

/// Parse literal outlet coordinates: `"x,y[,id];x,y[,id];..."`.
pub fn parse_coordinates(text: &str) -> Result<Vec<Outlet>> {
    let invalid = |item: &str, reason: &str| Error::InvalidParameter {
        name: "coordinates",
        value: item.to_string(),
        reason: reason.to_string(),
    };

    text.split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let parts: Vec<&str> = item.split(',').map(str::trim).collect();
            if parts.len() != 2 && parts.len() != 3 {
                return Err(invalid(item, "expected x,y or x,y,id"));
            }
            let x: f64 = parts[0].parse().map_err(|_| invalid(item, "x is not a number"))?;
            let y: f64 = parts[1].parse().map_err(|_| invalid(item, "y is not a number"))?;
            let id = match parts.get(2) {
                Some(s) => Some(s.parse::<i32>().map_err(|_| invalid(item, "id is not an integer"))?),
                None => None,
            };
            Ok(Outlet { x, y, id })
        })
        .collect()
}

/// Read outlets from a GeoJSON file of Point or MultiPoint features.
///
/// When `id_field` is given, its integer property becomes the outlet id;
/// features lacking it get no id. Non-point features are skipped.
pub fn read_outlets_geojson<P: AsRef<Path>>(path: P, id_field: Option<&str>) -> Result<Vec<Outlet>> {
    let text = fs::read_to_string(path.as_ref())?;
    let geojson: GeoJson = text.parse()?;

    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(g) => vec![Feature::from(g)],
    };

    let mut outlets = Vec::new();
    for feature in &features {
        let id = match id_field {
            Some(field) => feature_id(feature, field)?,
            None => None,
        };
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        match &geometry.value {
            Value::Point(pos) => outlets.push(position_to_outlet(pos, id)?),
            Value::MultiPoint(positions) => {
                for pos in positions {
                    outlets.push(position_to_outlet(pos, id)?);
                }
            }
            _ => continue,
        }
    }

    Ok(outlets)
}

fn feature_id(feature: &Feature, field: &str) -> Result<Option<i32>> {
    match feature.property(field) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Number(n)) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| Error::GeoJson(format!("{} = {} is not a 32-bit integer", field, n))),
        Some(other) => Err(Error::GeoJson(format!("{} = {} is not an integer", field, other))),
    }
}

fn position_to_outlet(pos: &[f64], id: Option<i32>) -> Result<Outlet> {
    match pos {
        [x, y, ..] => Ok(Outlet { x: *x, y: *y, id }),
        _ => Err(Error::GeoJson("point with fewer than two coordinates".into())),
    }
}

/// Write lines as a GeoJSON FeatureCollection of LineStrings.
///
/// Lines carrying an id get an `id` property.
pub fn write_lines_geojson<'a, P, I>(path: P, lines: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a Line>,
{
    let features = lines
        .into_iter()
        .map(|line| {
            let coords: Vec<Vec<f64>> = line.points().map(|(x, y)| vec![x, y]).collect();
            let properties = line.id.map(|id| {
                let mut props = JsonMap::new();
                props.insert("id".to_string(), JsonValue::from(id));
                props
            });
            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::LineString(coords))),
                id: None,
                properties,
                foreign_members: None,
            }
        })
        .collect();

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    fs::write(path.as_ref(), GeoJson::FeatureCollection(collection).to_string())?;
    Ok(())
}
