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

//! Fan-out over every registered layer.
//!
//! The coordinator owns one [`Poller`] per [`SourceKind`] and is the single
//! entry point a renderer talks to. Layer failures are isolated: one source
//! erroring never cancels or delays another.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info, warn};

use crate::entity::{Entity, EntityId, SourceKind};
use crate::error::FeedError;
use crate::fetch::{Fetcher, DEFAULT_FETCH_TIMEOUT};
use crate::orbit::SubPoint;
use crate::poller::{DiffCallback, FetchOutcome, Poller, PollerStatus, Subscription};
use crate::source::FeedSource;

/// Result of one layer in a [`RefreshReport`].
#[derive(Debug, Clone, PartialEq)]
pub struct LayerRefresh {
    pub kind: SourceKind,
    pub result: Result<FetchOutcome, FeedError>,
}

/// Per-layer results of [`RefreshCoordinator::refresh_all`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    pub layers: Vec<LayerRefresh>,
}

impl RefreshReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.layers.iter().all(|l| l.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (SourceKind, &FeedError)> {
        self.layers
            .iter()
            .filter_map(|l| l.result.as_ref().err().map(|e| (l.kind, e)))
    }

    #[must_use]
    pub fn get(&self, kind: SourceKind) -> Option<&Result<FetchOutcome, FeedError>> {
        self.layers.iter().find(|l| l.kind == kind).map(|l| &l.result)
    }
}

struct Layer {
    poller: Poller,
    interval: Duration,
}

/// Owns the pollers for every registered layer.
pub struct RefreshCoordinator {
    fetcher: Arc<dyn Fetcher>,
    timeout: Duration,
    layers: BTreeMap<SourceKind, Layer>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("layers", &self.layers.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_timeout(fetcher, DEFAULT_FETCH_TIMEOUT)
    }

    #[must_use]
    pub fn with_timeout(fetcher: Arc<dyn Fetcher>, timeout: Duration) -> Self {
        Self {
            fetcher,
            timeout,
            layers: BTreeMap::new(),
        }
    }

    /// Register a source. A second source of the same kind replaces the first.
    pub fn register(&mut self, source: Arc<dyn FeedSource>, interval: Duration) {
        let kind = source.kind();
        let poller = Poller::with_timeout(source, Arc::clone(&self.fetcher), self.timeout);
        if let Some(old) = self.layers.insert(kind, Layer { poller, interval }) {
            old.poller.disable();
        }
    }

    pub fn layers(&self) -> impl Iterator<Item = SourceKind> + '_ {
        self.layers.keys().copied()
    }

    #[must_use]
    pub fn enabled_layers(&self) -> Vec<SourceKind> {
        self.layers
            .iter()
            .filter(|(_, layer)| layer.poller.is_enabled())
            .map(|(kind, _)| *kind)
            .collect()
    }

    #[must_use]
    pub fn is_layer_enabled(&self, kind: SourceKind) -> bool {
        self.layers.get(&kind).is_some_and(|l| l.poller.is_enabled())
    }

    /// Enable or disable a layer. Returns `false` if the layer is not registered.
    ///
    /// Enabling starts the layer's timer, which fetches immediately.
    /// Disabling stops it, clears the snapshot and tells subscribers.
    pub fn set_layer_enabled(&self, kind: SourceKind, enabled: bool) -> bool {
        let Some(layer) = self.layers.get(&kind) else {
            warn!("Layer {kind} is not registered");
            return false;
        };
        match (enabled, layer.poller.is_enabled()) {
            (true, false) => layer.poller.enable(layer.interval),
            (false, true) => layer.poller.disable(),
            _ => debug!("Layer {kind} already {}", if enabled { "enabled" } else { "disabled" }),
        }
        true
    }

    /// Mark a layer enabled without starting its timer.
    ///
    /// Used by one-shot callers that drive fetches through
    /// [`refresh_all`](Self::refresh_all) only.
    pub fn arm_layer(&self, kind: SourceKind) -> bool {
        let Some(layer) = self.layers.get(&kind) else {
            return false;
        };
        layer.poller.enable_without_timer();
        true
    }

    /// Fetch every enabled layer concurrently and wait for all of them.
    pub async fn refresh_all(&self) -> RefreshReport {
        let pollers: Vec<(SourceKind, Poller)> = self
            .layers
            .iter()
            .filter(|(_, layer)| layer.poller.is_enabled())
            .map(|(kind, layer)| (*kind, layer.poller.clone()))
            .collect();

        let results = join_all(pollers.iter().map(|(_, poller)| poller.fetch_once())).await;

        let report = RefreshReport {
            layers: pollers
                .iter()
                .zip(results)
                .map(|((kind, _), result)| LayerRefresh { kind: *kind, result })
                .collect(),
        };
        info!(
            "Refreshed {} layers ({} failed)",
            report.layers.len(),
            report.failures().count()
        );
        report
    }

    /// Fetch a single layer now through the same path the timer uses.
    pub async fn refresh_one(&self, kind: SourceKind) -> Result<FetchOutcome, FeedError> {
        let poller = self
            .layers
            .get(&kind)
            .map(|layer| layer.poller.clone())
            .ok_or_else(|| FeedError::Validation(format!("layer {kind} is not registered")))?;
        poller.fetch_once().await
    }

    /// Current snapshot for a layer; empty when unknown or disabled.
    #[must_use]
    pub fn active_entities(&self, kind: SourceKind) -> Arc<Vec<Entity>> {
        self.layers
            .get(&kind)
            .map_or_else(|| Arc::new(Vec::new()), |layer| layer.poller.entities())
    }

    /// Register a diff callback for a layer.
    pub fn subscribe(&self, kind: SourceKind, callback: DiffCallback) -> Option<Subscription> {
        self.layers.get(&kind).map(|layer| layer.poller.subscribe(callback))
    }

    #[must_use]
    pub fn poller_status(&self, kind: SourceKind) -> Option<PollerStatus> {
        self.layers.get(&kind).map(|layer| layer.poller.status())
    }

    #[must_use]
    pub fn interval(&self, kind: SourceKind) -> Option<Duration> {
        self.layers.get(&kind).map(|layer| layer.interval)
    }

    /// Re-propagate the cached satellite elements to `at`.
    ///
    /// Lets a renderer animate satellites between polls without refetching.
    #[must_use]
    pub fn satellites_at(&self, at: DateTime<Utc>) -> Vec<(EntityId, SubPoint)> {
        self.active_entities(SourceKind::Satellites)
            .iter()
            .filter_map(Entity::as_satellite)
            .filter_map(|sat| match sat.position_at(at) {
                Ok(point) => Some((sat.id.clone(), point)),
                Err(e) => {
                    debug!("Cannot propagate {}: {e}", sat.id);
                    None
                }
            })
            .collect()
    }

    /// Stop every timer. Snapshots and subscriptions are left intact.
    pub fn shutdown(&self) {
        info!("Stopping {} pollers", self.layers.len());
        for layer in self.layers.values() {
            layer.poller.stop_polling();
        }
    }
}

impl Drop for RefreshCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::entity::GeoEntity;
    use crate::fetch::fake::FakeFetcher;
    use crate::reconcile::EntityDiff;
    use crate::source::{EarthquakeSource, FlightSource, SatelliteSource};

    const FLIGHTS: &str = "https://flights.test/states";
    const QUAKES: &str = "https://quakes.test/day.geojson";
    const TLE: &str = "https://tle.test/stations";

    const FLIGHT_PAYLOAD: &str = r#"{"time": 1, "states": [
        ["aaa111", "AAL1", "United States", 1, 1, -97.0, 35.0, 3000.0, false, 200.0, 90.0, 0.0, null, null, null, false, 0]
    ]}"#;

    const QUAKE_PAYLOAD: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "id": "us7000abcd", "properties": {"mag": 5.1, "place": "Fiji", "time": 1717200000000},
         "geometry": {"type": "Point", "coordinates": [178.1, -17.9, 550.0]}}
    ]}"#;

    const TLE_PAYLOAD: &str = "ISS (ZARYA)\n\
        1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927\n\
        2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537\n";

    fn coordinator(fetcher: &Arc<FakeFetcher>) -> RefreshCoordinator {
        let mut coordinator = RefreshCoordinator::new(Arc::clone(fetcher) as Arc<dyn Fetcher>);
        coordinator.register(Arc::new(FlightSource::new(FLIGHTS)), Duration::from_secs(15));
        coordinator.register(Arc::new(EarthquakeSource::new(QUAKES)), Duration::from_secs(300));
        coordinator.register(Arc::new(SatelliteSource::new(TLE)), Duration::from_secs(60));
        coordinator
    }

    #[tokio::test]
    async fn test_refresh_all_isolates_failures() {
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.respond(FLIGHTS, FLIGHT_PAYLOAD);
        fetcher.fail(QUAKES, FeedError::HttpStatus { status: 500, url: QUAKES.into() });
        let coordinator = coordinator(&fetcher);
        coordinator.arm_layer(SourceKind::Flights);
        coordinator.arm_layer(SourceKind::Earthquakes);

        let report = coordinator.refresh_all().await;
        assert_eq!(report.layers.len(), 2);
        assert!(!report.is_success());
        assert!(matches!(report.get(SourceKind::Flights), Some(Ok(FetchOutcome::Applied { added: 1, .. }))));
        let failures: Vec<_> = report.failures().map(|(kind, _)| kind).collect();
        assert_eq!(failures, vec![SourceKind::Earthquakes]);

        assert_eq!(coordinator.active_entities(SourceKind::Flights).len(), 1);
        let status = coordinator.poller_status(SourceKind::Earthquakes).unwrap();
        assert!(status.last_error.is_some());
        assert!(status.last_update.is_none());
    }

    #[tokio::test]
    async fn test_refresh_all_skips_disabled_layers() {
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.respond(FLIGHTS, FLIGHT_PAYLOAD);
        let coordinator = coordinator(&fetcher);
        coordinator.arm_layer(SourceKind::Flights);

        let report = coordinator.refresh_all().await;
        assert_eq!(report.layers.len(), 1);
        assert!(report.is_success());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_all_runs_layers_concurrently() {
        let fetcher = Arc::new(FakeFetcher::with_delay(Duration::from_secs(5)));
        fetcher.respond(FLIGHTS, FLIGHT_PAYLOAD);
        fetcher.respond(QUAKES, QUAKE_PAYLOAD);
        let coordinator = coordinator(&fetcher);
        coordinator.arm_layer(SourceKind::Flights);
        coordinator.arm_layer(SourceKind::Earthquakes);

        let started = tokio::time::Instant::now();
        let report = coordinator.refresh_all().await;
        let elapsed = started.elapsed();

        assert!(report.is_success());
        assert_eq!(report.layers.len(), 2);
        assert!(elapsed >= Duration::from_secs(5), "elapsed = {elapsed:?}");
        assert!(elapsed < Duration::from_secs(10), "elapsed = {elapsed:?}");
        assert_eq!(fetcher.max_active(), 2);
    }

    #[tokio::test]
    async fn test_refresh_one_unknown_layer() {
        let fetcher = Arc::new(FakeFetcher::new());
        let coordinator = coordinator(&fetcher);
        let err = coordinator.refresh_one(SourceKind::Cameras).await.unwrap_err();
        assert_eq!(err.category(), "validation");
        assert!(coordinator.active_entities(SourceKind::Cameras).is_empty());
        assert!(coordinator.poller_status(SourceKind::Cameras).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_fetches_immediately_and_disable_clears() {
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.respond(QUAKES, QUAKE_PAYLOAD);
        let coordinator = coordinator(&fetcher);

        let removed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&removed);
        let _sub = coordinator
            .subscribe(
                SourceKind::Earthquakes,
                Arc::new(move |_: SourceKind, diff: &EntityDiff<Entity>| {
                    counter.fetch_add(diff.to_remove.len(), Ordering::SeqCst);
                }),
            )
            .unwrap();

        assert!(coordinator.set_layer_enabled(SourceKind::Earthquakes, true));
        tokio::time::sleep(Duration::from_millis(10)).await;
        let quakes = coordinator.active_entities(SourceKind::Earthquakes);
        assert_eq!(quakes.len(), 1);
        assert_eq!(quakes[0].id().as_str(), "earthquakes:us7000abcd");
        assert_eq!(coordinator.enabled_layers(), vec![SourceKind::Earthquakes]);

        assert!(coordinator.set_layer_enabled(SourceKind::Earthquakes, false));
        assert!(coordinator.active_entities(SourceKind::Earthquakes).is_empty());
        assert_eq!(removed.load(Ordering::SeqCst), 1);
        assert!(!coordinator.set_layer_enabled(SourceKind::Cameras, true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_repolls_on_interval() {
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.respond(FLIGHTS, FLIGHT_PAYLOAD);
        let coordinator = coordinator(&fetcher);
        coordinator.set_layer_enabled(SourceKind::Flights, true);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(fetcher.calls(), 3);

        coordinator.shutdown();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_satellites_at_repropagates() {
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.respond(TLE, TLE_PAYLOAD);
        let coordinator = coordinator(&fetcher);
        coordinator.arm_layer(SourceKind::Satellites);
        coordinator.refresh_one(SourceKind::Satellites).await.unwrap();

        let t0 = Utc::now();
        let now = coordinator.satellites_at(t0);
        let later = coordinator.satellites_at(t0 + chrono::Duration::minutes(10));
        assert_eq!(now.len(), 1);
        assert_eq!(now[0].0.as_str(), "satellites:25544");
        assert!((now[0].1.longitude - later[0].1.longitude).abs() > 1.0);
    }
}
