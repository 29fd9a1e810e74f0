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

//! USGS earthquake feed parser.

use chrono::{DateTime, Utc};
use log::debug;
use serde_json::Value;

use super::geojson;
use crate::entity::{EarthquakeEntity, EntityId, SourceKind};
use crate::error::FeedError;

/// Parse a USGS GeoJSON summary feed.
///
/// Features without an id or a point geometry are dropped.
pub fn parse_earthquakes(payload: &[u8]) -> Result<Vec<EarthquakeEntity>, FeedError> {
    let features = geojson::features(payload)?;
    let total = features.len();
    let quakes: Vec<EarthquakeEntity> = features.iter().filter_map(parse_feature).collect();
    if quakes.len() < total {
        debug!("Dropped {} of {} earthquake features", total - quakes.len(), total);
    }
    Ok(quakes)
}

fn parse_feature(feature: &Value) -> Option<EarthquakeEntity> {
    let event_id = feature
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())?
        .to_string();
    let (latitude, longitude, depth_km) = geojson::point(feature.get("geometry")?)?;
    let props = geojson::properties(feature);

    Some(EarthquakeEntity {
        id: EntityId::new(SourceKind::Earthquakes, &event_id),
        magnitude: props.and_then(|p| geojson::number_prop(p, "mag")),
        place: props.and_then(|p| geojson::string_prop(p, "place")),
        depth_km,
        time: props
            .and_then(|p| p.get("time"))
            .and_then(Value::as_i64)
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        url: props.and_then(|p| geojson::string_prop(p, "url")),
        event_id,
        latitude,
        longitude,
    })
}
