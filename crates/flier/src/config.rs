//! Host configuration (window, vsync, wallpaper preferences). Loaded from flier.ron at startup.

use engine_core::SceneConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Persistent host settings. Loaded from `flier.ron` in the current directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallpaperConfig {
    /// Window width in logical pixels.
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    /// Window height in logical pixels.
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default = "default_true")]
    pub vsync: bool,
    /// Raw wallpaper preferences, e.g. `"general_quality": "2"`.
    #[serde(default)]
    pub preferences: HashMap<String, String>,
}

fn default_window_width() -> u32 {
    480
}
fn default_window_height() -> u32 {
    800
}
fn default_true() -> bool {
    true
}

impl Default for WallpaperConfig {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            vsync: default_true(),
            preferences: HashMap::new(),
        }
    }
}

impl WallpaperConfig {
    /// Load config from `flier.ron`. If the file is missing or invalid, returns default config.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(data) => Self::parse(&data).unwrap_or_else(|e| {
                log::warn!("Invalid config at {:?}: {}, using defaults", path, e);
                Self::default()
            }),
            Err(_) => {
                log::info!("No config at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    fn parse(data: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(data)
    }

    /// Scene settings derived from the preference map.
    pub fn scene_config(&self) -> SceneConfig {
        SceneConfig::from_preferences(&self.preferences)
    }
}

fn config_path() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join("flier.ron")
}
