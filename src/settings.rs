use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{LauncherError, Result};
use crate::options::OptionSet;
use crate::presets::PresetStore;
use crate::target::TargetDescriptor;

pub const SETTINGS_VERSION: u32 = 1;

/// Everything remembered between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub version: u32,
    pub options: OptionSet,
    pub last_target: Option<TargetDescriptor>,
    pub presets: PresetStore,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            options: OptionSet::default(),
            last_target: None,
            presets: PresetStore::default(),
        }
    }
}

// Keys the unversioned settings file kept at the top level.
const LEGACY_OPTION_KEYS: &[&str] = &[
    "multiplier",
    "flow_scale",
    "performance",
    "performance_mode",
    "hdr",
    "hdr_mode",
    "present_mode",
    "lsfg_process",
    "process",
    "mangohud",
    "extra_args",
];

impl Settings {
    /// Loads settings from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Writes through a sibling temp file so a crash never leaves a
    /// truncated document behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        std::fs::write(&tmp, self.to_json()?)?;
        std::fs::rename(&tmp, path)?;

        debug!(path = %path.display(), "settings saved");
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let mut value: Value = serde_json::from_str(contents)?;
        let document = value
            .as_object_mut()
            .ok_or_else(|| LauncherError::Settings("expected a JSON object at the top level".to_string()))?;

        let version = match document.get("version") {
            None => 0,
            Some(v) => v
                .as_u64()
                .ok_or_else(|| LauncherError::Settings(format!("invalid version field: {}", v)))?,
        };
        if version > u64::from(SETTINGS_VERSION) {
            return Err(LauncherError::Settings(format!(
                "settings version {} is newer than supported version {}",
                version, SETTINGS_VERSION
            )));
        }
        if version == 0 {
            info!("migrating unversioned settings document");
            migrate_unversioned(document);
        }

        let mut settings: Settings = serde_json::from_value(value)?;
        settings.version = SETTINGS_VERSION;
        settings.presets = settings
            .presets
            .normalized()
            .map_err(|e| LauncherError::Settings(format!("invalid preset list: {}", e)))?;
        Ok(settings)
    }

    /// Copies the current settings to `path` for backup or sharing.
    pub fn export(&self, path: &Path) -> Result<()> {
        self.save(path)
    }

    /// Reads settings from `path`. The file is fully parsed before anything
    /// is replaced, so a bad import leaves the current settings untouched.
    pub fn import(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LauncherError::Settings(format!("{} does not exist", path.display())));
        }
        Self::load(path)
    }
}

fn migrate_unversioned(document: &mut Map<String, Value>) {
    if !document.contains_key("options") {
        let mut options = Map::new();
        for key in LEGACY_OPTION_KEYS {
            if let Some(value) = document.remove(*key) {
                options.insert(key.to_string(), value);
            }
        }
        document.insert("options".to_string(), Value::Object(options));
    }

    if document.contains_key("last_target") {
        return;
    }

    let text = |document: &Map<String, Value>, key: &str| {
        document
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    };
    let tab = text(&*document, "last_tab");
    let flatpak_app = text(&*document, "flatpak_app");
    let host_cmd = text(&*document, "host_cmd");

    let target = match tab.as_str() {
        "host" if !host_cmd.is_empty() => Some(TargetDescriptor::host(host_cmd, text(&*document, "host_args"))),
        _ if !flatpak_app.is_empty() => Some(TargetDescriptor::flatpak(flatpak_app, text(&*document, "flatpak_args"))),
        _ if !host_cmd.is_empty() => Some(TargetDescriptor::host(host_cmd, text(&*document, "host_args"))),
        _ => None,
    };

    if let Some(target) = target.and_then(|t| serde_json::to_value(t).ok()) {
        document.insert("last_target".to_string(), target);
    }
}
