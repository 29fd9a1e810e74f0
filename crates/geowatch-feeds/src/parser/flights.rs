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

//! Aircraft state vector parser.
//!
//! The upstream answers with `{"time": <epoch>, "states": [[...], ...]}` where
//! each row is positional:
//!
//! ```text
//! 0 icao24, 1 callsign, 2 origin_country, 3 time_position, 4 last_contact,
//! 5 longitude, 6 latitude, 7 baro_altitude, 8 on_ground, 9 velocity,
//! 10 true_track, 11 vertical_rate, 12 sensors, 13 geo_altitude, ...
//! ```

use chrono::{DateTime, Utc};
use log::debug;
use serde_json::Value;

use crate::entity::{valid_coordinate, EntityId, FlightEntity, SourceKind};
use crate::error::FeedError;

const IDX_ICAO24: usize = 0;
const IDX_CALLSIGN: usize = 1;
const IDX_ORIGIN_COUNTRY: usize = 2;
const IDX_LAST_CONTACT: usize = 4;
const IDX_LONGITUDE: usize = 5;
const IDX_LATITUDE: usize = 6;
const IDX_BARO_ALTITUDE: usize = 7;
const IDX_ON_GROUND: usize = 8;
const IDX_VELOCITY: usize = 9;
const IDX_TRUE_TRACK: usize = 10;
const IDX_VERTICAL_RATE: usize = 11;
const IDX_GEO_ALTITUDE: usize = 13;

/// Parse a state-vector response into flights.
///
/// A `null` `states` array means "no aircraft" and yields an empty snapshot.
pub fn parse_flight_states(payload: &[u8]) -> Result<Vec<FlightEntity>, FeedError> {
    let root: Value = serde_json::from_slice(payload)?;
    let states = match root.get("states") {
        Some(Value::Array(rows)) => rows,
        Some(Value::Null) => return Ok(Vec::new()),
        Some(_) => return Err(FeedError::Decode("'states' is not an array".into())),
        None => return Err(FeedError::Decode("missing 'states' field".into())),
    };

    let flights: Vec<FlightEntity> = states.iter().filter_map(parse_row).collect();
    if flights.len() < states.len() {
        debug!("Dropped {} of {} flight rows", states.len() - flights.len(), states.len());
    }
    Ok(flights)
}

fn parse_row(row: &Value) -> Option<FlightEntity> {
    let row = row.as_array()?;

    let icao24 = text_at(row, IDX_ICAO24)?.to_ascii_lowercase();
    let latitude = number_at(row, IDX_LATITUDE)?;
    let longitude = number_at(row, IDX_LONGITUDE)?;
    if !valid_coordinate(latitude, longitude) {
        return None;
    }

    Some(FlightEntity {
        id: EntityId::new(SourceKind::Flights, &icao24),
        callsign: text_at(row, IDX_CALLSIGN).map(str::to_string),
        origin_country: text_at(row, IDX_ORIGIN_COUNTRY).map(str::to_string),
        latitude,
        longitude,
        altitude_m: number_at(row, IDX_BARO_ALTITUDE).or_else(|| number_at(row, IDX_GEO_ALTITUDE)),
        velocity_ms: number_at(row, IDX_VELOCITY),
        heading_deg: number_at(row, IDX_TRUE_TRACK),
        vertical_rate_ms: number_at(row, IDX_VERTICAL_RATE),
        on_ground: row.get(IDX_ON_GROUND).and_then(Value::as_bool).unwrap_or(false),
        last_contact: number_at(row, IDX_LAST_CONTACT).and_then(epoch_seconds),
        icao24,
    })
}

/// Non-empty trimmed string at `index`.
fn text_at(row: &[Value], index: usize) -> Option<&str> {
    row.get(index)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn number_at(row: &[Value], index: usize) -> Option<f64> {
    row.get(index).and_then(Value::as_f64).filter(|v| v.is_finite())
}

fn epoch_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    #[allow(clippy::cast_possible_truncation, reason = "epoch seconds are integral in this feed")]
    DateTime::from_timestamp(seconds as i64, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "time": 1717200000,
        "states": [
            ["a1b2c3", "UAL123  ", "United States", 1717199990, 1717199995, -118.4081, 33.9425, 10668.0, false, 230.5, 271.3, -2.6, null, 10700.0, "1200", false, 0],
            ["4840d6", "KLM1023 ", "Kingdom of the Netherlands", 1717199990, 1717199999, 4.76, 52.31, null, true, 5.1, 90.0, null, null, 15.2, null, false, 0],
            ["abcdef", "NOPOS   ", "United States", null, 1717199999, -100.0, null, 3000.0, false, 100.0, 10.0, 0.0, null, null, null, false, 0]
        ]
    }"#;

    #[test]
    fn test_drops_rows_without_position() {
        let flights = parse_flight_states(SAMPLE.as_bytes()).unwrap();
        assert_eq!(flights.len(), 2);
        assert!(flights.iter().all(|f| f.icao24 != "abcdef"));
    }

    #[test]
    fn test_positional_fields() {
        let flights = parse_flight_states(SAMPLE.as_bytes()).unwrap();
        let ual = &flights[0];
        assert_eq!(ual.id.as_str(), "flights:a1b2c3");
        assert_eq!(ual.callsign.as_deref(), Some("UAL123"));
        assert_eq!(ual.origin_country.as_deref(), Some("United States"));
        assert!((ual.latitude - 33.9425).abs() < 1e-9);
        assert!((ual.longitude + 118.4081).abs() < 1e-9);
        assert_eq!(ual.altitude_m, Some(10668.0));
        assert_eq!(ual.velocity_ms, Some(230.5));
        assert_eq!(ual.heading_deg, Some(271.3));
        assert_eq!(ual.vertical_rate_ms, Some(-2.6));
        assert!(!ual.on_ground);
        assert_eq!(ual.last_contact.map(|t| t.timestamp()), Some(1_717_199_995));
    }

    #[test]
    fn test_altitude_falls_back_to_geometric() {
        let flights = parse_flight_states(SAMPLE.as_bytes()).unwrap();
        let klm = &flights[1];
        assert_eq!(klm.altitude_m, Some(15.2));
        assert!(klm.on_ground);
        assert_eq!(klm.vertical_rate_ms, None);
    }

    #[test]
    fn test_null_states_is_empty_snapshot() {
        let flights = parse_flight_states(br#"{"time": 1, "states": null}"#).unwrap();
        assert!(flights.is_empty());
    }

    #[test]
    fn test_wrong_shape_is_decode_error() {
        assert!(matches!(
            parse_flight_states(br#"{"time": 1}"#),
            Err(FeedError::Decode(_))
        ));
        assert!(matches!(parse_flight_states(b"<html>"), Err(FeedError::Decode(_))));
    }

    #[test]
    fn test_row_missing_id_is_dropped() {
        let payload = br#"{"states": [[null, "X", "Y", 0, 0, 1.0, 2.0], ["", "X", "Y", 0, 0, 1.0, 2.0], "junk"]}"#;
        assert!(parse_flight_states(payload).unwrap().is_empty());
    }

    #[test]
    fn test_out_of_range_coordinates_dropped() {
        let payload = br#"{"states": [["a00001", "X", "Y", 0, 0, 200.0, 10.0]]}"#;
        assert!(parse_flight_states(payload).unwrap().is_empty());
    }
}
