use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

pub const DEFAULT_MAX_BADGES: usize = 3;
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_COMMAND_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SidebarSettings {
    pub binary_path: String,
    pub root_dir: Option<String>,
    pub display_fields: Vec<String>,
    pub max_badges: usize,
    pub debounce_ms: u64,
    pub command_timeout_seconds: u64,
    pub tracked_extension: String,
    pub language_id: String,
}

impl Default for SidebarSettings {
    fn default() -> Self {
        Self {
            binary_path: "hypha".to_string(),
            root_dir: None,
            display_fields: Vec::new(),
            max_badges: DEFAULT_MAX_BADGES,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            command_timeout_seconds: DEFAULT_COMMAND_TIMEOUT_SECONDS,
            tracked_extension: "md".to_string(),
            language_id: "markdown".to_string(),
        }
    }
}

impl SidebarSettings {
    /// Configured root, ignoring blank values.
    pub fn root(&self) -> Option<PathBuf> {
        self.root_dir
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    }

    pub fn is_configured(&self) -> bool {
        self.root().is_some()
    }

    pub fn binary(&self) -> &str {
        let trimmed = self.binary_path.trim();
        if trimmed.is_empty() {
            "hypha"
        } else {
            trimmed
        }
    }

    pub fn effective_max_badges(&self) -> usize {
        if self.max_badges == 0 {
            DEFAULT_MAX_BADGES
        } else {
            self.max_badges
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds.max(1))
    }

    pub fn tracks_path(&self, path: &str) -> bool {
        let extension = self.tracked_extension.trim_start_matches('.');
        path.rsplit_once('.')
            .map(|(_, ext)| ext.eq_ignore_ascii_case(extension))
            .unwrap_or(false)
    }
}

/// Shared in-memory settings; nothing is persisted.
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<SidebarSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: SidebarSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn snapshot(&self) -> SidebarSettings {
        match self.inner.read() {
            Ok(settings) => settings.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Deep-merges a JSON patch for the `hypha` section. Null values leave the field as is.
    pub fn apply_patch(&self, update: serde_json::Value) -> AppResult<SidebarSettings> {
        let mut writer = self
            .inner
            .write()
            .map_err(|_| AppError::Internal("settings lock poisoned".to_string()))?;
        let mut merged = serde_json::to_value(&*writer)?;
        merge_json_skip_null(&mut merged, update);
        let settings: SidebarSettings = serde_json::from_value(merged)?;
        *writer = settings.clone();
        Ok(settings)
    }
}

fn merge_json_skip_null(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json_skip_null(
                    target_map.entry(key).or_insert(serde_json::Value::Null),
                    value,
                );
            }
        }
        (_, serde_json::Value::Null) => {}
        (target, update) => {
            *target = update;
        }
    }
}
