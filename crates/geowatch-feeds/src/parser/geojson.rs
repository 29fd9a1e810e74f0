// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Lenient GeoJSON helpers shared by the seismic, alert, and radar parsers.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::entity::valid_coordinate;
use crate::error::FeedError;

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Value>,
}

/// Raw features of a feature collection.
///
/// Only the collection shape is enforced here; callers decide per feature
/// whether it is usable.
pub fn features(payload: &[u8]) -> Result<Vec<Value>, FeedError> {
    let collection: FeatureCollection = serde_json::from_slice(payload)?;
    Ok(collection.features)
}

/// Properties object of a feature, if present.
#[must_use]
pub fn properties(feature: &Value) -> Option<&Map<String, Value>> {
    feature.get("properties").and_then(Value::as_object)
}

/// Non-empty trimmed string property.
#[must_use]
pub fn string_prop(props: &Map<String, Value>, key: &str) -> Option<String> {
    props
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Finite numeric property.
#[must_use]
pub fn number_prop(props: &Map<String, Value>, key: &str) -> Option<f64> {
    props.get(key).and_then(Value::as_f64).filter(|v| v.is_finite())
}

/// `(latitude, longitude, elevation)` of a `Point` geometry.
#[must_use]
pub fn point(geometry: &Value) -> Option<(f64, f64, Option<f64>)> {
    if geometry.get("type").and_then(Value::as_str) != Some("Point") {
        return None;
    }
    let coords = geometry.get("coordinates")?.as_array()?;
    let (lat, lon) = lat_lon(coords)?;
    let elevation = coords.get(2).and_then(Value::as_f64);
    Some((lat, lon, elevation))
}

/// A single point standing in for any supported geometry.
///
/// Points map to themselves; polygons and multipolygons map to the mean of
/// their outer ring vertices. A ring's closing vertex is counted once, and
/// longitudes are unwrapped so rings across the antimeridian stay intact.
#[must_use]
pub fn representative_point(geometry: &Value) -> Option<(f64, f64)> {
    let kind = geometry.get("type").and_then(Value::as_str)?;
    let coords = geometry.get("coordinates")?.as_array()?;
    match kind {
        "Point" => lat_lon(coords),
        "Polygon" => centroid(&ring_vertices(coords.first()?.as_array()?)),
        "MultiPolygon" => {
            let vertices: Vec<(f64, f64)> = coords
                .iter()
                .filter_map(|polygon| polygon.as_array()?.first()?.as_array())
                .flat_map(|ring| ring_vertices(ring))
                .collect();
            centroid(&vertices)
        }
        _ => None,
    }
}

fn lat_lon(pair: &[Value]) -> Option<(f64, f64)> {
    let lon = pair.first()?.as_f64()?;
    let lat = pair.get(1)?.as_f64()?;
    valid_coordinate(lat, lon).then_some((lat, lon))
}

fn ring_vertices(ring: &[Value]) -> Vec<(f64, f64)> {
    let mut vertices: Vec<(f64, f64)> = ring
        .iter()
        .filter_map(|v| lat_lon(v.as_array()?))
        .collect();
    if vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }
    vertices
}

fn centroid(vertices: &[(f64, f64)]) -> Option<(f64, f64)> {
    let &(_, reference) = vertices.first()?;
    #[allow(clippy::cast_precision_loss, reason = "vertex counts are small")]
    let n = vertices.len() as f64;
    let lat = vertices.iter().map(|(lat, _)| lat).sum::<f64>() / n;
    // Longitudes relative to the first vertex, each within half a turn of it.
    let offset = vertices
        .iter()
        .map(|(_, lon)| {
            let delta = lon - reference;
            if delta > 180.0 {
                delta - 360.0
            } else if delta < -180.0 {
                delta + 360.0
            } else {
                delta
            }
        })
        .sum::<f64>()
        / n;
    let mut lon = reference + offset;
    if lon > 180.0 {
        lon -= 360.0;
    } else if lon < -180.0 {
        lon += 360.0;
    }
    Some((lat, lon))
}
