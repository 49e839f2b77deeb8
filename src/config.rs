use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const APP_DIR: &str = "lsfgvk-launcher";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,
    /// Overrides the default settings.json location
    pub settings_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Prefix that moves a command out of the sandbox onto the host.
    /// Empty runs commands directly.
    pub host_wrapper: Vec<String>,
    pub frame_generation_layer: String,
    pub mangohud_layer: String,
    /// Injected as VK_LAYER_PATH when non-empty
    pub vk_layer_path: String,
    /// Searched by `check` for the layer manifest
    pub layer_manifest_dirs: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            settings_path: None,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            host_wrapper: vec!["flatpak-spawn".to_string(), "--host".to_string()],
            frame_generation_layer: "lsfg_vk".to_string(),
            mangohud_layer: "VK_LAYER_MangoHud_overlay_x86_64".to_string(),
            vk_layer_path: "/usr/share/vulkan/explicit_layer.d:/etc/vulkan/explicit_layer.d".to_string(),
            layer_manifest_dirs: vec![
                "/usr/share/vulkan/implicit_layer.d".to_string(),
                "/usr/share/vulkan/explicit_layer.d".to_string(),
                "/etc/vulkan/implicit_layer.d".to_string(),
                "/etc/vulkan/explicit_layer.d".to_string(),
                "$HOME/.local/share/vulkan/implicit_layer.d".to_string(),
            ],
        }
    }
}

impl Config {
    /// Load from `path`, or the default location when `None`.
    /// A missing file is created with defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("parsing {}", config_path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(config_path, contents)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(APP_DIR)
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.general
            .settings_path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("settings.json"))
    }
}
