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

//! Geo-positioned entities surfaced to a renderer.
//!
//! Every entity carries an [`EntityId`] derived from a key that is stable
//! across fetches (transponder address, NORAD catalog number, USGS event id,
//! station call sign, directory key). The reconciler depends on id equality
//! surviving from one snapshot to the next, so ids are never generated.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PropagationError;
use crate::orbit::{self, OrbitalElements, SubPoint};

/// The feeds the engine knows how to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Flights,
    Satellites,
    Earthquakes,
    WeatherAlerts,
    RadarStations,
    Cameras,
}

impl SourceKind {
    pub const ALL: [SourceKind; 6] = [
        Self::Flights,
        Self::Satellites,
        Self::Earthquakes,
        Self::WeatherAlerts,
        Self::RadarStations,
        Self::Cameras,
    ];

    /// Stable string form, used in ids and persisted layer sets.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flights => "flights",
            Self::Satellites => "satellites",
            Self::Earthquakes => "earthquakes",
            Self::WeatherAlerts => "weather_alerts",
            Self::RadarStations => "radar_stations",
            Self::Cameras => "cameras",
        }
    }

    /// Default refresh cadence for this feed.
    #[must_use]
    pub fn default_interval(&self) -> Duration {
        match self {
            Self::Flights => Duration::from_secs(15),
            Self::Satellites => Duration::from_secs(60),
            Self::Earthquakes | Self::WeatherAlerts => Duration::from_secs(300),
            Self::RadarStations | Self::Cameras => Duration::from_secs(600),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown layer '{s}'"))
    }
}

/// Identity of an entity, stable across refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    /// Build an id from the feed and the feed's own stable key.
    #[must_use]
    pub fn new(kind: SourceKind, key: &str) -> Self {
        Self(format!("{}:{}", kind.as_str(), key.trim()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Minimal contract the reconciler and renderer need from an entity.
pub trait GeoEntity {
    fn id(&self) -> &EntityId;
    fn latitude(&self) -> f64;
    fn longitude(&self) -> f64;
}

/// Aircraft state vector.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightEntity {
    pub id: EntityId,
    /// ICAO 24-bit transponder address, lowercase hex.
    pub icao24: String,
    pub callsign: Option<String>,
    pub origin_country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Barometric altitude in meters, geometric when barometric is absent.
    pub altitude_m: Option<f64>,
    pub velocity_ms: Option<f64>,
    /// True track in degrees clockwise from north.
    pub heading_deg: Option<f64>,
    pub vertical_rate_ms: Option<f64>,
    pub on_ground: bool,
    pub last_contact: Option<DateTime<Utc>>,
}

/// Satellite sub-point computed from orbital elements.
#[derive(Debug, Clone, PartialEq)]
pub struct SatelliteEntity {
    pub id: EntityId,
    pub catalog_number: u32,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_km: f64,
    /// Elements this position was derived from.
    pub elements: Arc<OrbitalElements>,
}

impl SatelliteEntity {
    /// Propagate the elements to `at` and build the entity.
    pub fn from_elements(
        elements: Arc<OrbitalElements>,
        at: DateTime<Utc>,
    ) -> Result<Self, PropagationError> {
        let point = orbit::propagate(&elements, at)?;
        Ok(Self {
            id: EntityId::new(SourceKind::Satellites, &elements.catalog_number.to_string()),
            catalog_number: elements.catalog_number,
            name: elements.name.clone(),
            latitude: point.latitude,
            longitude: point.longitude,
            altitude_km: point.altitude_km,
            elements,
        })
    }

    /// Extrapolate this satellite's position to another instant.
    pub fn position_at(&self, at: DateTime<Utc>) -> Result<SubPoint, PropagationError> {
        orbit::propagate(&self.elements, at)
    }
}

/// Seismic event.
#[derive(Debug, Clone, PartialEq)]
pub struct EarthquakeEntity {
    pub id: EntityId,
    pub event_id: String,
    pub magnitude: Option<f64>,
    pub place: Option<String>,
    pub depth_km: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Severity of a weather alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertSeverity {
    Extreme,
    Severe,
    Moderate,
    Minor,
    Unknown,
}

/// Hazard family of a weather alert, derived from its free-text event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertCategory {
    Tornado,
    Thunderstorm,
    Flood,
    WinterStorm,
    Heat,
    Wind,
    Fire,
    Tropical,
    Other,
}

/// Active weather alert positioned at its area centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherAlertEntity {
    pub id: EntityId,
    pub event: String,
    pub category: AlertCategory,
    pub severity: AlertSeverity,
    pub headline: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Weather radar site.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarStationEntity {
    pub id: EntityId,
    pub call_sign: String,
    pub name: Option<String>,
    pub station_type: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Where a camera record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraOrigin {
    BuiltIn,
    Scraped,
}

/// Public camera from the directory.
///
/// `stream_url` is taken from directory data as-is. Nothing checks that it
/// still serves video, so treat it as a hint.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraEntity {
    pub id: EntityId,
    pub key: String,
    pub name: String,
    pub stream_url: Option<String>,
    pub origin: CameraOrigin,
    pub latitude: f64,
    pub longitude: f64,
}

macro_rules! geo_entity {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl GeoEntity for $ty {
                fn id(&self) -> &EntityId {
                    &self.id
                }

                fn latitude(&self) -> f64 {
                    self.latitude
                }

                fn longitude(&self) -> f64 {
                    self.longitude
                }
            }
        )+
    };
}

geo_entity!(
    FlightEntity,
    SatelliteEntity,
    EarthquakeEntity,
    WeatherAlertEntity,
    RadarStationEntity,
    CameraEntity,
);

/// Any entity the engine can hand to a renderer.
///
/// ```
/// use geowatch_feeds::{Entity, EntityId, GeoEntity, RadarStationEntity, SourceKind};
///
/// let station = Entity::RadarStation(RadarStationEntity {
///     id: EntityId::new(SourceKind::RadarStations, "KTLX"),
///     call_sign: "KTLX".into(),
///     name: Some("Oklahoma City".into()),
///     station_type: Some("WSR-88D".into()),
///     latitude: 35.333,
///     longitude: -97.278,
/// });
/// assert_eq!(station.kind(), SourceKind::RadarStations);
/// assert_eq!(station.id().as_str(), "radar_stations:KTLX");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Flight(FlightEntity),
    Satellite(SatelliteEntity),
    Earthquake(EarthquakeEntity),
    WeatherAlert(WeatherAlertEntity),
    RadarStation(RadarStationEntity),
    Camera(CameraEntity),
}

impl Entity {
    /// Feed this entity belongs to.
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Flight(_) => SourceKind::Flights,
            Self::Satellite(_) => SourceKind::Satellites,
            Self::Earthquake(_) => SourceKind::Earthquakes,
            Self::WeatherAlert(_) => SourceKind::WeatherAlerts,
            Self::RadarStation(_) => SourceKind::RadarStations,
            Self::Camera(_) => SourceKind::Cameras,
        }
    }

    #[must_use]
    pub fn as_satellite(&self) -> Option<&SatelliteEntity> {
        match self {
            Self::Satellite(sat) => Some(sat),
            _ => None,
        }
    }
}

impl Entity {
    fn inner(&self) -> &dyn GeoEntity {
        match self {
            Self::Flight(e) => e,
            Self::Satellite(e) => e,
            Self::Earthquake(e) => e,
            Self::WeatherAlert(e) => e,
            Self::RadarStation(e) => e,
            Self::Camera(e) => e,
        }
    }
}

impl GeoEntity for Entity {
    fn id(&self) -> &EntityId {
        self.inner().id()
    }

    fn latitude(&self) -> f64 {
        self.inner().latitude()
    }

    fn longitude(&self) -> f64 {
        self.inner().longitude()
    }
}

/// Check a coordinate pair is finite and inside WGS84 bounds.
#[must_use]
pub fn valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}
