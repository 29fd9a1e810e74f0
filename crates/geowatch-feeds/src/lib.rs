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

//! Live geospatial feed library.
//!
//! Polls several independent public feeds (aircraft state vectors, satellite
//! element sets, earthquakes, weather alerts, radar stations and a camera
//! directory), normalises them into typed entities, and hands a renderer the
//! minimal add/remove diff needed to keep a map in sync.
//!
//! The library is layered so each piece can be used on its own:
//!
//! - **Parser layer**: pure payload-to-entity functions ([`parser`])
//! - **Orbit layer**: two-body propagation with sidereal correction ([`orbit`])
//! - **Reconciler**: identity-set diffing ([`reconcile()`])
//! - **Poller layer**: single-flight timed fetching per source ([`Poller`])
//! - **Coordinator**: fan-out, layer toggling, subscriptions ([`RefreshCoordinator`])
//! - **Settings**: persisted preferences with a load-suppressing state machine
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use geowatch_feeds::{source_for, HttpFetcher, RefreshCoordinator, SourceKind, DEFAULT_FETCH_TIMEOUT};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), geowatch_feeds::FeedError> {
//!     let fetcher = Arc::new(HttpFetcher::new(DEFAULT_FETCH_TIMEOUT, "geowatch")?);
//!     let mut coordinator = RefreshCoordinator::new(fetcher);
//!     for kind in SourceKind::ALL {
//!         coordinator.register(source_for(kind, None), kind.default_interval());
//!     }
//!
//!     let _sub = coordinator.subscribe(
//!         SourceKind::Earthquakes,
//!         Arc::new(|kind: SourceKind, diff: &geowatch_feeds::EntityDiff<geowatch_feeds::Entity>| {
//!             println!("{kind}: +{} -{}", diff.to_add.len(), diff.to_remove.len());
//!         }),
//!     );
//!     coordinator.set_layer_enabled(SourceKind::Earthquakes, true);
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!     coordinator.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Using Individual Layers
//!
//! ```
//! use std::collections::HashSet;
//! use geowatch_feeds::{parser, reconcile};
//!
//! let payload = br#"{"time": 0, "states": [["abc123", "UAL1", "US", 0, 0, -97.0, 35.0, 1000.0, false, 0.0, 0.0, 0.0, null, null, null, false, 0]]}"#;
//! let flights = parser::parse_flight_states(payload).unwrap();
//! let diff = reconcile(&HashSet::new(), &flights);
//! assert_eq!(diff.to_add.len(), 1);
//! ```

pub mod coordinator;
pub mod entity;
pub mod error;
pub mod fetch;
pub mod orbit;
pub mod parser;
pub mod poller;
pub mod reconcile;
pub mod settings;
pub mod source;

pub use coordinator::{LayerRefresh, RefreshCoordinator, RefreshReport};
pub use entity::{
    AlertCategory, AlertSeverity, CameraEntity, CameraOrigin, EarthquakeEntity, Entity, EntityId, FlightEntity,
    GeoEntity, RadarStationEntity, SatelliteEntity, SourceKind, WeatherAlertEntity,
};
pub use error::{FeedError, PropagationError, SettingsError};
pub use fetch::{Fetcher, HttpFetcher, DEFAULT_FETCH_TIMEOUT};
pub use orbit::{gmst, propagate, OrbitalElements, SubPoint};
pub use poller::{DiffCallback, FetchOutcome, Poller, PollerState, PollerStatus, Subscription};
pub use reconcile::{reconcile, EntityDiff};
pub use settings::{CameraPosition, PersistedSettings, SettingsMachine, SettingsPhase, SettingsStore, VisualMode};
pub use source::{source_for, FeedSource};
