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

//! Weather alert feed parser.
//!
//! Alert severity and event names are free text upstream. Both are mapped
//! through fixed tables into closed enums; anything unrecognised lands in an
//! explicit `Unknown`/`Other` variant rather than being dropped.

use chrono::{DateTime, Utc};
use log::debug;
use serde_json::Value;

use super::geojson;
use crate::entity::{AlertCategory, AlertSeverity, EntityId, SourceKind, WeatherAlertEntity};
use crate::error::FeedError;

const SEVERITY_TABLE: &[(&str, AlertSeverity)] = &[
    ("extreme", AlertSeverity::Extreme),
    ("severe", AlertSeverity::Severe),
    ("moderate", AlertSeverity::Moderate),
    ("minor", AlertSeverity::Minor),
];

/// Event-name keywords, checked in order.
const CATEGORY_TABLE: &[(&str, AlertCategory)] = &[
    ("tornado", AlertCategory::Tornado),
    ("hurricane", AlertCategory::Tropical),
    ("tropical", AlertCategory::Tropical),
    ("typhoon", AlertCategory::Tropical),
    ("thunderstorm", AlertCategory::Thunderstorm),
    ("flood", AlertCategory::Flood),
    ("winter", AlertCategory::WinterStorm),
    ("blizzard", AlertCategory::WinterStorm),
    ("ice storm", AlertCategory::WinterStorm),
    ("snow", AlertCategory::WinterStorm),
    ("heat", AlertCategory::Heat),
    ("wind", AlertCategory::Wind),
    ("fire", AlertCategory::Fire),
];

/// Map a severity string to its enum variant.
#[must_use]
pub fn severity_from_str(value: &str) -> AlertSeverity {
    let value = value.trim().to_ascii_lowercase();
    SEVERITY_TABLE
        .iter()
        .find(|(name, _)| *name == value)
        .map_or(AlertSeverity::Unknown, |(_, severity)| *severity)
}

/// Map a free-text event name to its hazard category.
#[must_use]
pub fn category_for_event(event: &str) -> AlertCategory {
    let event = event.to_ascii_lowercase();
    CATEGORY_TABLE
        .iter()
        .find(|(keyword, _)| event.contains(keyword))
        .map_or(AlertCategory::Other, |(_, category)| *category)
}

/// Parse an alert feature collection.
///
/// Alerts need an id and a geometry that yields a representative point.
pub fn parse_weather_alerts(payload: &[u8]) -> Result<Vec<WeatherAlertEntity>, FeedError> {
    let features = geojson::features(payload)?;
    let total = features.len();
    let alerts: Vec<WeatherAlertEntity> = features.iter().filter_map(parse_feature).collect();
    if alerts.len() < total {
        debug!("Dropped {} of {} weather alerts without id or geometry", total - alerts.len(), total);
    }
    Ok(alerts)
}

fn parse_feature(feature: &Value) -> Option<WeatherAlertEntity> {
    let props = geojson::properties(feature)?;
    let alert_id = geojson::string_prop(props, "id").or_else(|| {
        feature
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
    })?;
    let (latitude, longitude) = geojson::representative_point(feature.get("geometry")?)?;

    let event = geojson::string_prop(props, "event").unwrap_or_else(|| "Unknown".to_string());
    Some(WeatherAlertEntity {
        id: EntityId::new(SourceKind::WeatherAlerts, &alert_id),
        category: category_for_event(&event),
        severity: geojson::string_prop(props, "severity")
            .as_deref()
            .map_or(AlertSeverity::Unknown, severity_from_str),
        headline: geojson::string_prop(props, "headline"),
        expires: geojson::string_prop(props, "expires")
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc)),
        event,
        latitude,
        longitude,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "id": "https://api.weather.gov/alerts/urn:oid:2.49.0.1.840.0.aaa",
                "type": "Feature",
                "geometry": {"type": "Polygon", "coordinates": [[[-97.0, 35.0], [-96.0, 35.0], [-96.0, 36.0], [-97.0, 36.0]]]},
                "properties": {
                    "id": "urn:oid:2.49.0.1.840.0.aaa",
                    "event": "Tornado Warning",
                    "severity": "Extreme",
                    "headline": "Tornado Warning issued for Cleveland County",
                    "expires": "2024-06-01T01:00:00-05:00"
                }
            },
            {
                "id": "https://api.weather.gov/alerts/urn:oid:2.49.0.1.840.0.bbb",
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [-80.0, 26.0]},
                "properties": {
                    "id": "urn:oid:2.49.0.1.840.0.bbb",
                    "event": "Rip Current Statement",
                    "severity": "Catastrophic"
                }
            },
            {
                "id": "https://api.weather.gov/alerts/urn:oid:2.49.0.1.840.0.ccc",
                "type": "Feature",
                "geometry": null,
                "properties": {"id": "urn:oid:2.49.0.1.840.0.ccc", "event": "Heat Advisory", "severity": "Moderate"}
            }
        ]
    }"#;

    #[test]
    fn test_parse_alerts() {
        let alerts = parse_weather_alerts(SAMPLE.as_bytes()).unwrap();
        assert_eq!(alerts.len(), 2);

        let tornado = &alerts[0];
        assert_eq!(tornado.id.as_str(), "weather_alerts:urn:oid:2.49.0.1.840.0.aaa");
        assert_eq!(tornado.category, AlertCategory::Tornado);
        assert_eq!(tornado.severity, AlertSeverity::Extreme);
        assert!((tornado.latitude - 35.5).abs() < 1e-9);
        assert!((tornado.longitude + 96.5).abs() < 1e-9);
        assert_eq!(tornado.expires.map(|t| t.timestamp()), Some(1_717_221_600));
    }

    #[test]
    fn test_unknown_values_are_kept() {
        let alerts = parse_weather_alerts(SAMPLE.as_bytes()).unwrap();
        let rip = &alerts[1];
        assert_eq!(rip.category, AlertCategory::Other);
        assert_eq!(rip.severity, AlertSeverity::Unknown);
        assert_eq!(rip.event, "Rip Current Statement");
    }

    #[test]
    fn test_severity_table() {
        assert_eq!(severity_from_str(" SEVERE "), AlertSeverity::Severe);
        assert_eq!(severity_from_str("minor"), AlertSeverity::Minor);
        assert_eq!(severity_from_str(""), AlertSeverity::Unknown);
    }

    #[test]
    fn test_category_table() {
        assert_eq!(category_for_event("Severe Thunderstorm Watch"), AlertCategory::Thunderstorm);
        assert_eq!(category_for_event("Flash Flood Warning"), AlertCategory::Flood);
        assert_eq!(category_for_event("Winter Storm Warning"), AlertCategory::WinterStorm);
        assert_eq!(category_for_event("Red Flag Warning"), AlertCategory::Other);
        assert_eq!(category_for_event("Fire Weather Watch"), AlertCategory::Fire);
        assert_eq!(category_for_event("Hurricane Warning"), AlertCategory::Tropical);
    }
}
