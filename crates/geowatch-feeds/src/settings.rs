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

//! Persisted user settings and the load/ready state machine around them.
//!
//! The machine moves `Uninitialized → Loading → Ready`. While loading, the
//! persisted values are restored through the same [`SettingsMachine::update`]
//! path user edits take, so observers see them, but nothing is written back.
//! Once ready, every effective change saves the whole record synchronously.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use log::{error, info};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::entity::SourceKind;
use crate::error::SettingsError;

/// Base map presentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum VisualMode {
    #[default]
    Standard,
    Night,
    Satellite,
}

impl VisualMode {
    pub const ALL: [VisualMode; 3] = [Self::Standard, Self::Night, Self::Satellite];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Night => "night",
            Self::Satellite => "satellite",
        }
    }
}

impl fmt::Display for VisualMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisualMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| format!("unknown visual mode '{s}'"))
    }
}

impl Serialize for VisualMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Unknown strings fall back to the default mode instead of failing the load.
impl<'de> Deserialize<'de> for VisualMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f64,
}

impl Default for CameraPosition {
    fn default() -> Self {
        Self {
            latitude: 39.8283,
            longitude: -98.5795,
            altitude_m: 5_000_000.0,
        }
    }
}

/// The persisted record.
///
/// `selected_location` is a stable key into the static location list, never
/// an index or a generated id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedSettings {
    pub visual_mode: VisualMode,
    pub active_layers: BTreeSet<String>,
    pub selected_location: Option<String>,
    pub camera: CameraPosition,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            visual_mode: VisualMode::default(),
            active_layers: [SourceKind::Flights, SourceKind::Earthquakes, SourceKind::WeatherAlerts]
                .iter()
                .map(|k| k.as_str().to_string())
                .collect(),
            selected_location: None,
            camera: CameraPosition::default(),
        }
    }
}

impl PersistedSettings {
    /// Active layers that name a known source; unknown names are ignored.
    #[must_use]
    pub fn active_kinds(&self) -> Vec<SourceKind> {
        self.active_layers
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect()
    }

    #[must_use]
    pub fn is_layer_active(&self, kind: SourceKind) -> bool {
        self.active_layers.contains(kind.as_str())
    }
}

/// Durable storage for [`PersistedSettings`].
pub trait SettingsStore {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<PersistedSettings>, SettingsError>;

    fn save(&self, settings: &PersistedSettings) -> Result<(), SettingsError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsPhase {
    Uninitialized,
    Loading,
    Ready,
}

impl SettingsPhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
        }
    }
}

type Observer = Box<dyn Fn(&PersistedSettings) + Send>;

/// Owns the settings record and decides when it is written.
pub struct SettingsMachine<S> {
    store: S,
    phase: SettingsPhase,
    settings: PersistedSettings,
    observers: Vec<Observer>,
}

impl<S> fmt::Debug for SettingsMachine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsMachine")
            .field("phase", &self.phase)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<S: SettingsStore> SettingsMachine<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            phase: SettingsPhase::Uninitialized,
            settings: PersistedSettings::default(),
            observers: Vec::new(),
        }
    }

    #[must_use]
    pub fn phase(&self) -> SettingsPhase {
        self.phase
    }

    #[must_use]
    pub fn settings(&self) -> &PersistedSettings {
        &self.settings
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Called after every effective change, including restores during load.
    pub fn on_change(&mut self, observer: impl Fn(&PersistedSettings) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Restore from the store and enter `Ready`.
    ///
    /// A store failure is logged and defaults are used; the machine still
    /// becomes ready.
    pub fn load(&mut self) -> Result<&PersistedSettings, SettingsError> {
        if self.phase != SettingsPhase::Uninitialized {
            return Err(SettingsError::InvalidPhase(self.phase.as_str()));
        }
        self.phase = SettingsPhase::Loading;

        let restored = match self.store.load() {
            Ok(Some(saved)) => saved,
            Ok(None) => {
                info!("No saved settings, using defaults");
                PersistedSettings::default()
            }
            Err(e) => {
                error!("Failed to load settings, using defaults: {e}");
                PersistedSettings::default()
            }
        };

        let PersistedSettings {
            visual_mode,
            active_layers,
            selected_location,
            camera,
        } = restored;
        self.update(|s| s.visual_mode = visual_mode)?;
        self.update(|s| s.active_layers = active_layers)?;
        self.update(|s| s.selected_location = selected_location)?;
        self.update(|s| s.camera = camera)?;

        self.phase = SettingsPhase::Ready;
        Ok(&self.settings)
    }

    /// Apply a mutation. Returns whether anything changed.
    ///
    /// Saves only in `Ready`, and only when the record actually changed.
    pub fn update(&mut self, mutate: impl FnOnce(&mut PersistedSettings)) -> Result<bool, SettingsError> {
        let before = self.settings.clone();
        mutate(&mut self.settings);
        if self.settings == before {
            return Ok(false);
        }

        for observer in &self.observers {
            observer(&self.settings);
        }
        if self.phase == SettingsPhase::Ready {
            self.persist()?;
        }
        Ok(true)
    }

    pub fn set_visual_mode(&mut self, mode: VisualMode) -> Result<bool, SettingsError> {
        self.update(|s| s.visual_mode = mode)
    }

    pub fn set_layer_active(&mut self, kind: SourceKind, active: bool) -> Result<bool, SettingsError> {
        self.update(|s| {
            if active {
                s.active_layers.insert(kind.as_str().to_string());
            } else {
                s.active_layers.remove(kind.as_str());
            }
        })
    }

    pub fn select_location(&mut self, key: Option<&str>) -> Result<bool, SettingsError> {
        let key = key.map(str::to_string);
        self.update(|s| s.selected_location = key)
    }

    pub fn set_camera(&mut self, camera: CameraPosition) -> Result<bool, SettingsError> {
        self.update(|s| s.camera = camera)
    }

    /// Restore defaults and save immediately. Only legal once ready.
    pub fn reset(&mut self) -> Result<(), SettingsError> {
        if self.phase != SettingsPhase::Ready {
            return Err(SettingsError::InvalidPhase(self.phase.as_str()));
        }
        info!("Resetting settings to defaults");
        self.settings = PersistedSettings::default();
        for observer in &self.observers {
            observer(&self.settings);
        }
        self.persist()
    }

    fn persist(&self) -> Result<(), SettingsError> {
        self.store.save(&self.settings).inspect_err(|e| {
            error!("Failed to save settings: {e}");
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    struct RecordingStore {
        saved: Option<PersistedSettings>,
        fail_load: bool,
        writes: Mutex<Vec<PersistedSettings>>,
    }

    impl SettingsStore for RecordingStore {
        fn load(&self) -> Result<Option<PersistedSettings>, SettingsError> {
            if self.fail_load {
                return Err(SettingsError::Store("corrupt file".into()));
            }
            Ok(self.saved.clone())
        }

        fn save(&self, settings: &PersistedSettings) -> Result<(), SettingsError> {
            self.writes.lock().unwrap().push(settings.clone());
            Ok(())
        }
    }

    fn saved_record() -> PersistedSettings {
        PersistedSettings {
            visual_mode: VisualMode::Night,
            active_layers: ["satellites".to_string(), "cameras".to_string()].into_iter().collect(),
            selected_location: Some("tokyo".to_string()),
            camera: CameraPosition { latitude: 35.0, longitude: 139.0, altitude_m: 800_000.0 },
        }
    }

    fn writes(machine: &SettingsMachine<RecordingStore>) -> Vec<PersistedSettings> {
        machine.store().writes.lock().unwrap().clone()
    }

    #[test]
    fn test_load_restores_without_writing() {
        let store = RecordingStore { saved: Some(saved_record()), ..Default::default() };
        let mut machine = SettingsMachine::new(store);
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        machine.on_change(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        machine.load().unwrap();
        assert_eq!(machine.phase(), SettingsPhase::Ready);
        assert_eq!(machine.settings(), &saved_record());
        assert_eq!(notified.load(Ordering::SeqCst), 4);
        assert!(writes(&machine).is_empty());
    }

    #[test]
    fn test_each_change_after_load_saves_full_record() {
        let store = RecordingStore { saved: Some(saved_record()), ..Default::default() };
        let mut machine = SettingsMachine::new(store);
        machine.load().unwrap();

        assert!(machine.set_visual_mode(VisualMode::Satellite).unwrap());
        let written = writes(&machine);
        assert_eq!(written.len(), 1);
        let mut expected = saved_record();
        expected.visual_mode = VisualMode::Satellite;
        assert_eq!(written[0], expected);

        assert!(machine.set_layer_active(SourceKind::Flights, true).unwrap());
        assert_eq!(writes(&machine).len(), 2);
    }

    #[test]
    fn test_no_op_change_does_not_save() {
        let mut machine = SettingsMachine::new(RecordingStore::default());
        machine.load().unwrap();
        assert!(!machine.set_visual_mode(VisualMode::Standard).unwrap());
        assert!(!machine.set_layer_active(SourceKind::Flights, true).unwrap());
        assert!(writes(&machine).is_empty());
    }

    #[test]
    fn test_changes_before_load_are_not_saved() {
        let mut machine = SettingsMachine::new(RecordingStore::default());
        assert!(machine.select_location(Some("paris")).unwrap());
        assert!(writes(&machine).is_empty());
    }

    #[test]
    fn test_reset_requires_ready() {
        let mut machine = SettingsMachine::new(RecordingStore { saved: Some(saved_record()), ..Default::default() });
        assert!(matches!(machine.reset(), Err(SettingsError::InvalidPhase("uninitialized"))));

        machine.load().unwrap();
        machine.reset().unwrap();
        assert_eq!(machine.settings(), &PersistedSettings::default());
        assert_eq!(writes(&machine), vec![PersistedSettings::default()]);
    }

    #[test]
    fn test_load_failure_falls_back_to_defaults() {
        let mut machine = SettingsMachine::new(RecordingStore { fail_load: true, ..Default::default() });
        machine.load().unwrap();
        assert_eq!(machine.phase(), SettingsPhase::Ready);
        assert_eq!(machine.settings(), &PersistedSettings::default());
        assert!(matches!(machine.load(), Err(SettingsError::InvalidPhase("ready"))));
    }

    #[test]
    fn test_unknown_persisted_values_are_tolerated() {
        let json = r#"{"visual_mode": "hologram", "active_layers": ["flights", "tiles"]}"#;
        let settings: PersistedSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.visual_mode, VisualMode::Standard);
        assert_eq!(settings.active_kinds(), vec![SourceKind::Flights]);
        assert_eq!(settings.camera, CameraPosition::default());
        assert!(!settings.is_layer_active(SourceKind::Cameras));
    }
}
