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

//! Feed sources: one per map layer.
//!
//! A source knows where its upstream lives and how to turn the payload into
//! entities. It holds no state between fetches; the poller owns the
//! snapshot.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};

use crate::entity::{CameraEntity, Entity, SatelliteEntity, SourceKind};
use crate::error::FeedError;
use crate::fetch::Fetcher;
use crate::parser::{self, cameras::BUILTIN_CAMERA_CSV};

pub const OPENSKY_STATES_URL: &str = "https://opensky-network.org/api/states/all";
pub const CELESTRAK_STATIONS_URL: &str =
    "https://celestrak.org/NORAD/elements/gp.php?GROUP=stations&FORMAT=tle";
pub const USGS_DAY_SUMMARY_URL: &str =
    "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/all_day.geojson";
pub const NWS_ACTIVE_ALERTS_URL: &str = "https://api.weather.gov/alerts/active";
pub const NWS_RADAR_STATIONS_URL: &str = "https://api.weather.gov/radar/stations";

/// A pollable upstream that produces a full entity snapshot per fetch.
#[async_trait]
pub trait FeedSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn fetch(&self, fetcher: &dyn Fetcher) -> Result<Vec<Entity>, FeedError>;
}

/// Default upstream URL for a layer.
///
/// Cameras have no default scrape page.
#[must_use]
pub fn default_url(kind: SourceKind) -> Option<&'static str> {
    match kind {
        SourceKind::Flights => Some(OPENSKY_STATES_URL),
        SourceKind::Satellites => Some(CELESTRAK_STATIONS_URL),
        SourceKind::Earthquakes => Some(USGS_DAY_SUMMARY_URL),
        SourceKind::WeatherAlerts => Some(NWS_ACTIVE_ALERTS_URL),
        SourceKind::RadarStations => Some(NWS_RADAR_STATIONS_URL),
        SourceKind::Cameras => None,
    }
}

/// Build the source for `kind`, falling back to its default URL.
#[must_use]
pub fn source_for(kind: SourceKind, url: Option<String>) -> Arc<dyn FeedSource> {
    let url = url
        .filter(|u| !u.trim().is_empty())
        .or_else(|| default_url(kind).map(str::to_string));
    match kind {
        SourceKind::Flights => Arc::new(FlightSource::new(url.unwrap_or_default())),
        SourceKind::Satellites => Arc::new(SatelliteSource::new(url.unwrap_or_default())),
        SourceKind::Earthquakes => Arc::new(EarthquakeSource::new(url.unwrap_or_default())),
        SourceKind::WeatherAlerts => Arc::new(WeatherAlertSource::new(url.unwrap_or_default())),
        SourceKind::RadarStations => Arc::new(RadarStationSource::new(url.unwrap_or_default())),
        SourceKind::Cameras => Arc::new(CameraSource::new(url)),
    }
}

macro_rules! url_source {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            url: String,
        }

        impl $name {
            #[must_use]
            pub fn new(url: impl Into<String>) -> Self {
                Self { url: url.into() }
            }

            #[must_use]
            pub fn url(&self) -> &str {
                &self.url
            }
        }
    };
}

url_source!(
    /// Aircraft state vectors.
    FlightSource
);
url_source!(
    /// Two-line element catalog, propagated to the fetch instant.
    SatelliteSource
);
url_source!(EarthquakeSource);
url_source!(WeatherAlertSource);
url_source!(RadarStationSource);

#[async_trait]
impl FeedSource for FlightSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Flights
    }

    async fn fetch(&self, fetcher: &dyn Fetcher) -> Result<Vec<Entity>, FeedError> {
        let payload = fetcher.fetch(&self.url).await?;
        Ok(parser::parse_flight_states(&payload)?
            .into_iter()
            .map(Entity::Flight)
            .collect())
    }
}

#[async_trait]
impl FeedSource for SatelliteSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Satellites
    }

    async fn fetch(&self, fetcher: &dyn Fetcher) -> Result<Vec<Entity>, FeedError> {
        let payload = fetcher.fetch(&self.url).await?;
        let text = std::str::from_utf8(&payload)?;
        let catalog = parser::parse_tle_catalog(text);
        if catalog.is_empty() && !text.trim().is_empty() {
            return Err(FeedError::Decode("no valid element sets in catalog".to_string()));
        }

        let now = Utc::now();
        let mut satellites = Vec::with_capacity(catalog.len());
        for elements in catalog {
            let catalog_number = elements.catalog_number;
            match SatelliteEntity::from_elements(Arc::new(elements), now) {
                Ok(sat) => satellites.push(Entity::Satellite(sat)),
                Err(e) => debug!("Skipping satellite {catalog_number}: {e}"),
            }
        }
        Ok(satellites)
    }
}

#[async_trait]
impl FeedSource for EarthquakeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Earthquakes
    }

    async fn fetch(&self, fetcher: &dyn Fetcher) -> Result<Vec<Entity>, FeedError> {
        let payload = fetcher.fetch(&self.url).await?;
        Ok(parser::parse_earthquakes(&payload)?
            .into_iter()
            .map(Entity::Earthquake)
            .collect())
    }
}

#[async_trait]
impl FeedSource for WeatherAlertSource {
    fn kind(&self) -> SourceKind {
        SourceKind::WeatherAlerts
    }

    async fn fetch(&self, fetcher: &dyn Fetcher) -> Result<Vec<Entity>, FeedError> {
        let payload = fetcher.fetch(&self.url).await?;
        Ok(parser::parse_weather_alerts(&payload)?
            .into_iter()
            .map(Entity::WeatherAlert)
            .collect())
    }
}

#[async_trait]
impl FeedSource for RadarStationSource {
    fn kind(&self) -> SourceKind {
        SourceKind::RadarStations
    }

    async fn fetch(&self, fetcher: &dyn Fetcher) -> Result<Vec<Entity>, FeedError> {
        let payload = fetcher.fetch(&self.url).await?;
        Ok(parser::parse_radar_stations(&payload)?
            .into_iter()
            .map(Entity::RadarStation)
            .collect())
    }
}

/// Built-in camera directory, optionally merged with a scraped page.
///
/// A failed scrape is logged and the built-in directory is served alone.
#[derive(Debug, Clone)]
pub struct CameraSource {
    directory_url: Option<String>,
}

impl CameraSource {
    #[must_use]
    pub fn new(directory_url: Option<String>) -> Self {
        Self { directory_url }
    }

    async fn scrape(&self, fetcher: &dyn Fetcher, url: &str) -> Result<Vec<CameraEntity>, FeedError> {
        let payload = fetcher.fetch(url).await?;
        let html = String::from_utf8_lossy(&payload);
        parser::parse_camera_page(&html)
    }
}

#[async_trait]
impl FeedSource for CameraSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Cameras
    }

    async fn fetch(&self, fetcher: &dyn Fetcher) -> Result<Vec<Entity>, FeedError> {
        let builtin = parser::parse_builtin_cameras(BUILTIN_CAMERA_CSV)?;

        let scraped = match &self.directory_url {
            Some(url) => match self.scrape(fetcher, url).await {
                Ok(cams) => cams,
                Err(e) => {
                    warn!("Camera directory scrape failed, using built-in list only: {e}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        Ok(parser::merge_camera_directories(builtin, scraped)
            .into_iter()
            .map(Entity::Camera)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{CameraOrigin, GeoEntity};
    use crate::fetch::fake::FakeFetcher;

    const TLE: &str = "ISS (ZARYA)\n\
        1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927\n\
        2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537\n";

    #[tokio::test]
    async fn test_flight_source_maps_entities() {
        let fetcher = FakeFetcher::new();
        fetcher.respond(
            OPENSKY_STATES_URL,
            r#"{"time": 1, "states": [["abc123", "UAL1  ", "United States", 1, 1, -97.0, 35.0, 1000.0, false, 200.0, 90.0, 0.0, null, 1010.0, null, false, 0]]}"#,
        );
        let source = source_for(SourceKind::Flights, None);
        let entities = source.fetch(&fetcher).await.unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].kind(), SourceKind::Flights);
        assert_eq!(entities[0].id().as_str(), "flights:abc123");
    }

    #[tokio::test]
    async fn test_satellite_source_propagates() {
        let fetcher = FakeFetcher::new();
        fetcher.respond("https://tle.test/stations", TLE);
        let source = SatelliteSource::new("https://tle.test/stations");
        let entities = source.fetch(&fetcher).await.unwrap();
        assert_eq!(entities.len(), 1);
        let sat = entities[0].as_satellite().unwrap();
        assert_eq!(sat.catalog_number, 25544);
        assert_eq!(sat.name, "ISS (ZARYA)");
        assert!(sat.latitude.abs() <= 51.7);
    }

    #[tokio::test]
    async fn test_satellite_source_rejects_garbage() {
        let fetcher = FakeFetcher::new();
        fetcher.respond("https://tle.test/bad", "<html>maintenance</html>");
        let source = SatelliteSource::new("https://tle.test/bad");
        assert!(matches!(source.fetch(&fetcher).await, Err(FeedError::Decode(_))));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let fetcher = FakeFetcher::new();
        let source = EarthquakeSource::new("https://quakes.test/none");
        assert!(matches!(source.fetch(&fetcher).await, Err(FeedError::Transport(_))));
    }

    #[tokio::test]
    async fn test_camera_scrape_failure_degrades_to_builtin() {
        let fetcher = FakeFetcher::new();
        fetcher.fail(
            "https://cams.test/",
            FeedError::HttpStatus { status: 503, url: "https://cams.test/".into() },
        );
        let source = CameraSource::new(Some("https://cams.test/".to_string()));
        let entities = source.fetch(&fetcher).await.unwrap();
        assert!(!entities.is_empty());
        assert!(entities.iter().all(|e| matches!(e, Entity::Camera(c) if c.origin == CameraOrigin::BuiltIn)));
    }

    #[tokio::test]
    async fn test_camera_scrape_merges() {
        let fetcher = FakeFetcher::new();
        fetcher.respond(
            "https://cams.test/",
            r#"<div data-camera-id="bos-harbor" data-lat="42.36" data-lon="-71.05" data-name="Boston Harbor"></div>"#,
        );
        let with_scrape = CameraSource::new(Some("https://cams.test/".to_string()))
            .fetch(&fetcher)
            .await
            .unwrap();
        let builtin_only = CameraSource::new(None).fetch(&fetcher).await.unwrap();
        assert_eq!(with_scrape.len(), builtin_only.len() + 1);
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn test_empty_url_falls_back_to_default() {
        let source = source_for(SourceKind::RadarStations, Some("  ".to_string()));
        assert_eq!(source.kind(), SourceKind::RadarStations);
        assert_eq!(default_url(SourceKind::Cameras), None);
    }
}
