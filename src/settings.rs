use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::stats::DEFAULT_GOOD_THRESHOLD_SECS;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

pub const BACKEND_URL_ENV: &str = "HANDTIME_BACKEND_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub backend_url: String,
    pub grace_period_secs: u64,
    pub tick_interval_ms: u64,
    pub good_threshold_secs: u64,
    pub max_hands: usize,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:9000".into(),
            grace_period_secs: 5,
            tick_interval_ms: 1000,
            good_threshold_secs: DEFAULT_GOOD_THRESHOLD_SECS,
            max_hands: 2,
            request_timeout_secs: 10,
        }
    }
}

impl Settings {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        // A zero interval would make tokio panic.
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                self.backend_url = url;
            }
        }
        self
    }
}

/// Fields a caller wants changed; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub backend_url: Option<String>,
    pub grace_period_secs: Option<u64>,
    pub tick_interval_ms: Option<u64>,
    pub good_threshold_secs: Option<u64>,
    pub max_hands: Option<usize>,
    pub request_timeout_secs: Option<u64>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(self, settings: &mut Settings) {
        if let Some(url) = self.backend_url {
            settings.backend_url = url;
        }
        if let Some(secs) = self.grace_period_secs {
            settings.grace_period_secs = secs;
        }
        if let Some(ms) = self.tick_interval_ms {
            settings.tick_interval_ms = ms;
        }
        if let Some(secs) = self.good_threshold_secs {
            settings.good_threshold_secs = secs;
        }
        if let Some(max) = self.max_hands {
            settings.max_hands = max;
        }
        if let Some(secs) = self.request_timeout_secs {
            settings.request_timeout_secs = secs;
        }
    }
}

pub struct SettingsStore {
    path: Option<PathBuf>,
    data: RwLock<Settings>,
}

impl SettingsStore {
    /// Loads settings from `path` when given. A missing file means defaults;
    /// an unreadable or malformed one is logged and also falls back to
    /// defaults. Environment overrides apply last.
    pub fn new(path: Option<PathBuf>) -> Result<Self> {
        let data = match &path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read settings from {}", path.display()))?;
                serde_json::from_str(&contents).unwrap_or_else(|err| {
                    log_warn!("Ignoring malformed settings at {}: {err}", path.display());
                    Settings::default()
                })
            }
            _ => Settings::default(),
        };

        Ok(Self {
            path,
            data: RwLock::new(data.apply_env()),
        })
    }

    pub fn settings(&self) -> Settings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn has_file(&self) -> bool {
        self.path.is_some()
    }

    /// Applies `patch` on top of the current settings and writes the result
    /// back to the settings file.
    pub fn apply_patch(&self, patch: SettingsPatch) -> Result<Settings> {
        let mut settings = self.settings();
        patch.apply(&mut settings);
        self.update(settings.clone())?;
        Ok(settings)
    }

    pub fn update(&self, settings: Settings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests here assume HANDTIME_BACKEND_URL is unset.

    #[test]
    fn defaults_when_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(Some(dir.path().join("missing.json"))).unwrap();
        let settings = store.settings();
        assert_eq!(settings.grace_period(), Duration::from_secs(5));
        assert_eq!(settings.tick_interval(), Duration::from_secs(1));
        assert_eq!(settings.good_threshold_secs, 300);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"grace_period_secs": 2}"#).unwrap();

        let settings = SettingsStore::new(Some(path)).unwrap().settings();
        assert_eq!(settings.grace_period_secs, 2);
        assert_eq!(settings.max_hands, 2);
    }

    #[test]
    fn malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();

        let settings = SettingsStore::new(Some(path)).unwrap().settings();
        assert_eq!(settings.max_hands, Settings::default().max_hands);
    }

    #[test]
    fn update_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(Some(path.clone())).unwrap();

        let mut settings = store.settings();
        settings.good_threshold_secs = 120;
        store.update(settings).unwrap();

        let reloaded = SettingsStore::new(Some(path)).unwrap().settings();
        assert_eq!(reloaded.good_threshold_secs, 120);
    }

    #[test]
    fn patch_changes_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"max_hands": 1}"#).unwrap();
        let store = SettingsStore::new(Some(path.clone())).unwrap();
        assert!(store.has_file());

        let patch = SettingsPatch {
            grace_period_secs: Some(8),
            good_threshold_secs: Some(60),
            ..SettingsPatch::default()
        };
        assert!(!patch.is_empty());
        let applied = store.apply_patch(patch).unwrap();
        assert_eq!(applied.grace_period_secs, 8);
        assert_eq!(applied.max_hands, 1);
        assert_eq!(store.settings(), applied);

        let reloaded = SettingsStore::new(Some(path)).unwrap().settings();
        assert_eq!(reloaded.good_threshold_secs, 60);
        assert_eq!(reloaded.max_hands, 1);
        assert_eq!(reloaded.tick_interval_ms, 1000);
    }

    #[test]
    fn patch_without_file_stays_in_memory() {
        let store = SettingsStore::new(None).unwrap();
        assert!(!store.has_file());
        assert!(SettingsPatch::default().is_empty());

        let applied = store
            .apply_patch(SettingsPatch {
                max_hands: Some(1),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(applied.max_hands, 1);
        assert_eq!(store.settings().max_hands, 1);
    }
}
