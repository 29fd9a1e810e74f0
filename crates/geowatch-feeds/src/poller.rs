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

//! Per-source polling with a single-flight guard.
//!
//! A [`Poller`] owns one source's entity snapshot and the identity set it
//! has reported to subscribers. Every fetch, whether triggered by the timer
//! or on demand, goes through [`Poller::fetch_once`]:
//!
//! - a fetch that finds another one outstanding is skipped, never queued
//! - a failed fetch records the error and keeps the previous snapshot
//! - a fetch that completes after the layer was disabled is discarded
//! - a fetch skipped behind a discarded one runs as soon as that one ends
//!
//! Subscribers receive an [`EntityDiff`] each time the identity set changes.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::entity::{Entity, EntityId, GeoEntity, SourceKind};
use crate::error::FeedError;
use crate::fetch::{Fetcher, DEFAULT_FETCH_TIMEOUT};
use crate::reconcile::{reconcile, EntityDiff};
use crate::source::FeedSource;

/// Shortest accepted polling interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Callback invoked with each non-empty diff.
pub type DiffCallback = Arc<dyn Fn(SourceKind, &EntityDiff<Entity>) + Send + Sync>;

/// Result of a single [`Poller::fetch_once`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Fresh snapshot applied.
    Applied { added: usize, removed: usize, total: usize },
    /// Another fetch was already in flight.
    Skipped,
    /// The layer was disabled before the response could be applied.
    Discarded,
}

/// Bookkeeping owned by a poller.
#[derive(Debug, Clone, PartialEq)]
pub struct PollerState {
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<FeedError>,
    pub is_in_flight: bool,
    pub interval: Duration,
}

/// Renderer-facing view of a poller.
#[derive(Debug, Clone, PartialEq)]
pub struct PollerStatus {
    pub last_update: Option<DateTime<Utc>>,
    pub is_loading: bool,
    pub last_error: Option<FeedError>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    callbacks: Vec<(u64, DiffCallback)>,
}

/// Handle returned by [`Poller::subscribe`].
///
/// The callback stays registered until [`Subscription::dispose`] is called
/// or the handle is dropped. The handle does not keep the poller alive.
#[must_use = "dropping a Subscription unregisters its callback"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("live", &(self.registry.strong_count() > 0))
            .finish()
    }
}

impl Subscription {
    /// Unregister the callback now.
    pub fn dispose(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).callbacks.retain(|(id, _)| *id != self.id);
        }
    }
}

struct PollerInner {
    source: Arc<dyn FeedSource>,
    fetcher: Arc<dyn Fetcher>,
    timeout: Duration,
    in_flight: AtomicBool,
    in_flight_generation: AtomicU64,
    refetch: AtomicBool,
    enabled: AtomicBool,
    generation: AtomicU64,
    entities: RwLock<Arc<Vec<Entity>>>,
    rendered: Mutex<HashSet<EntityId>>,
    state: Mutex<PollerState>,
    subscribers: Arc<Mutex<Registry>>,
    timer: Mutex<Option<CancellationToken>>,
}

/// Cloneable handle to one source's polling state.
#[derive(Clone)]
pub struct Poller {
    inner: Arc<PollerInner>,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("kind", &self.kind())
            .field("enabled", &self.is_enabled())
            .field("in_flight", &self.inner.in_flight.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

/// Clears the in-flight flag when the fetch future completes or is dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Poller {
    /// Create a disabled poller with the default fetch timeout.
    #[must_use]
    pub fn new(source: Arc<dyn FeedSource>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_timeout(source, fetcher, DEFAULT_FETCH_TIMEOUT)
    }

    #[must_use]
    pub fn with_timeout(source: Arc<dyn FeedSource>, fetcher: Arc<dyn Fetcher>, timeout: Duration) -> Self {
        let interval = source.kind().default_interval();
        Self {
            inner: Arc::new(PollerInner {
                source,
                fetcher,
                timeout,
                in_flight: AtomicBool::new(false),
                in_flight_generation: AtomicU64::new(0),
                refetch: AtomicBool::new(false),
                enabled: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                entities: RwLock::new(Arc::new(Vec::new())),
                rendered: Mutex::new(HashSet::new()),
                state: Mutex::new(PollerState {
                    last_success_at: None,
                    last_error: None,
                    is_in_flight: false,
                    interval,
                }),
                subscribers: Arc::new(Mutex::new(Registry::default())),
                timer: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn kind(&self) -> SourceKind {
        self.inner.source.kind()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_polling(&self) -> bool {
        lock(&self.inner.timer).is_some()
    }

    /// Current snapshot. Cheap to clone; replaced wholesale on each fetch.
    #[must_use]
    pub fn entities(&self) -> Arc<Vec<Entity>> {
        Arc::clone(&self.inner.entities.read().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn state(&self) -> PollerState {
        let mut state = lock(&self.inner.state).clone();
        state.is_in_flight = self.inner.in_flight.load(Ordering::Acquire);
        state
    }

    #[must_use]
    pub fn status(&self) -> PollerStatus {
        let state = self.state();
        PollerStatus {
            last_update: state.last_success_at,
            is_loading: state.is_in_flight,
            last_error: state.last_error,
        }
    }

    /// Register a diff callback.
    pub fn subscribe(&self, callback: DiffCallback) -> Subscription {
        let mut registry = lock(&self.inner.subscribers);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.callbacks.push((id, callback));
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner.subscribers),
        }
    }

    /// Fetch, parse and apply one snapshot.
    ///
    /// If the layer was disabled and re-enabled while this fetch was out, a
    /// fetch skipped in the meantime is run here once the stale one ends.
    pub async fn fetch_once(&self) -> Result<FetchOutcome, FeedError> {
        loop {
            let outcome = self.fetch_generation().await;
            if outcome == Ok(FetchOutcome::Discarded)
                && self.is_enabled()
                && self.inner.refetch.swap(false, Ordering::AcqRel)
            {
                debug!("{}: layer re-enabled during fetch, fetching again", self.kind());
                continue;
            }
            return outcome;
        }
    }

    async fn fetch_generation(&self) -> Result<FetchOutcome, FeedError> {
        let inner = &self.inner;
        let kind = self.kind();

        // Generation before the enabled flag: `disable` clears the flag first.
        let generation = loop {
            let generation = inner.generation.load(Ordering::Acquire);
            if !self.is_enabled() {
                return Ok(FetchOutcome::Discarded);
            }
            if inner
                .in_flight
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break generation;
            }
            let stale = inner.in_flight_generation.load(Ordering::Acquire) != generation;
            if !stale || inner.refetch.swap(true, Ordering::AcqRel) {
                debug!("{kind}: fetch already in flight, skipping");
                return Ok(FetchOutcome::Skipped);
            }
            // Refetch requested; retry once in case the stale fetch just ended.
        };
        let _guard = InFlightGuard(&inner.in_flight);
        inner.in_flight_generation.store(generation, Ordering::Release);
        inner.refetch.store(false, Ordering::Release);

        let result = match tokio::time::timeout(inner.timeout, inner.source.fetch(inner.fetcher.as_ref())).await {
            Ok(result) => result,
            Err(_) => Err(FeedError::Transport(format!(
                "timed out after {}s",
                inner.timeout.as_secs()
            ))),
        };

        match result {
            Ok(entities) => Ok(self.apply(generation, entities)),
            Err(e) => {
                if inner.generation.load(Ordering::Acquire) != generation {
                    return Ok(FetchOutcome::Discarded);
                }
                warn!("{kind}: fetch failed: {e}");
                lock(&inner.state).last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    fn apply(&self, generation: u64, entities: Vec<Entity>) -> FetchOutcome {
        let inner = &self.inner;
        let kind = self.kind();

        let (diff, total) = {
            let mut rendered = lock(&inner.rendered);
            if inner.generation.load(Ordering::Acquire) != generation {
                debug!("{kind}: layer disabled during fetch, discarding response");
                return FetchOutcome::Discarded;
            }

            let diff = reconcile(&rendered, &entities);
            for id in &diff.to_remove {
                rendered.remove(id);
            }
            for entity in &diff.to_add {
                rendered.insert(entity.id().clone());
            }

            let total = entities.len();
            *inner.entities.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(entities);

            let mut state = lock(&inner.state);
            state.last_success_at = Some(Utc::now());
            state.last_error = None;
            debug!("{kind}: {total} entities (+{} -{})", diff.to_add.len(), diff.to_remove.len());
            (diff, total)
        };

        let outcome = FetchOutcome::Applied {
            added: diff.to_add.len(),
            removed: diff.to_remove.len(),
            total,
        };
        self.notify(&diff);
        outcome
    }

    fn notify(&self, diff: &EntityDiff<Entity>) {
        if diff.is_empty() {
            return;
        }
        let callbacks: Vec<DiffCallback> = lock(&self.inner.subscribers)
            .callbacks
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        let kind = self.kind();
        for callback in callbacks {
            callback(kind, diff);
        }
    }

    /// Enable the layer and start its timer.
    pub fn enable(&self, interval: Duration) {
        self.inner.enabled.store(true, Ordering::Release);
        self.start_polling(interval);
    }

    /// Enable the layer for on-demand fetches only.
    pub fn enable_without_timer(&self) {
        self.inner.enabled.store(true, Ordering::Release);
    }

    /// Stop the timer, clear the snapshot and report the removals.
    ///
    /// A fetch still in flight is discarded when it returns.
    pub fn disable(&self) {
        self.stop_polling();
        self.inner.enabled.store(false, Ordering::Release);

        let diff = {
            let mut rendered = lock(&self.inner.rendered);
            self.inner.generation.fetch_add(1, Ordering::AcqRel);
            let mut to_remove: Vec<EntityId> = rendered.drain().collect();
            to_remove.sort();
            *self.inner.entities.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(Vec::new());
            EntityDiff { to_add: Vec::new(), to_remove }
        };
        info!("{}: layer disabled, removing {} entities", self.kind(), diff.to_remove.len());
        self.notify(&diff);
    }

    /// Fetch immediately, then on every `interval` tick.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_polling(&self, interval: Duration) {
        self.stop_polling();
        let interval = interval.max(MIN_POLL_INTERVAL);
        let token = CancellationToken::new();
        *lock(&self.inner.timer) = Some(token.clone());
        lock(&self.inner.state).interval = interval;

        info!("{}: polling every {}s", self.kind(), interval.as_secs());
        let poller = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let tick_poller = poller.clone();
                        tokio::spawn(async move {
                            let _ = tick_poller.fetch_once().await;
                        });
                    }
                    () = token.cancelled() => {
                        debug!("{}: polling stopped", poller.kind());
                        return;
                    }
                }
            }
        });
    }

    pub fn stop_polling(&self) {
        if let Some(token) = lock(&self.inner.timer).take() {
            token.cancel();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
