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

//! Weather radar station list parser.

use serde_json::Value;

use super::geojson;
use crate::entity::{EntityId, RadarStationEntity, SourceKind};
use crate::error::FeedError;

/// Parse a radar station feature collection keyed by call sign.
pub fn parse_radar_stations(payload: &[u8]) -> Result<Vec<RadarStationEntity>, FeedError> {
    Ok(geojson::features(payload)?
        .iter()
        .filter_map(parse_feature)
        .collect())
}

fn parse_feature(feature: &Value) -> Option<RadarStationEntity> {
    let props = geojson::properties(feature)?;
    let call_sign = geojson::string_prop(props, "id")?.to_ascii_uppercase();
    let (latitude, longitude, _) = geojson::point(feature.get("geometry")?)?;

    Some(RadarStationEntity {
        id: EntityId::new(SourceKind::RadarStations, &call_sign),
        name: geojson::string_prop(props, "name"),
        station_type: geojson::string_prop(props, "stationType"),
        call_sign,
        latitude,
        longitude,
    })
}
