//! Scene configuration: render quality, brightness and color schemes.
//!
//! Values arrive from a host preference store as loosely typed strings.
//! Parsing never fails: anything missing or malformed falls back to the
//! documented default and is logged.

use std::collections::HashMap;

/// Linear RGB triple in `[0, 1]`.
pub type Rgb = [f32; 3];

pub const KEY_QUALITY: &str = "general_quality";
pub const KEY_BRIGHTNESS: &str = "general_brightness";
pub const KEY_SCHEME: &str = "colors_scheme";
pub const KEY_BG_TOP: &str = "colors_bg_top";
pub const KEY_BG_BOTTOM: &str = "colors_bg_bottom";
pub const KEY_WAVE_FRONT: &str = "colors_wave_front";
pub const KEY_WAVE_BACK: &str = "colors_wave_back";
pub const KEY_PLANE: &str = "colors_plane";
pub const KEY_PLANE_OUTLINE: &str = "colors_plane_outline";
pub const KEY_CLOUD: &str = "colors_cloud";
pub const KEY_CLOUD_OUTLINE: &str = "colors_cloud_outline";

/// Brightness percentage bounds accepted from preferences.
pub const BRIGHTNESS_MIN: u32 = 50;
pub const BRIGHTNESS_MAX: u32 = 120;
pub const BRIGHTNESS_DEFAULT: u32 = 100;

/// Offscreen render resolution relative to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    /// One third of the surface resolution.
    Low,
    /// Half the surface resolution.
    #[default]
    Medium,
    /// Full surface resolution.
    High,
}

impl Quality {
    /// Integer divisor applied to each surface dimension.
    pub fn scale_divisor(self) -> u32 {
        match self {
            Quality::Low => 3,
            Quality::Medium => 2,
            Quality::High => 1,
        }
    }

    /// Offscreen target size for a surface, never smaller than 1x1.
    pub fn scaled_size(self, width: u32, height: u32) -> (u32, u32) {
        let divisor = self.scale_divisor();
        ((width / divisor).max(1), (height / divisor).max(1))
    }

    fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Quality::Low),
            1 => Some(Quality::Medium),
            2 => Some(Quality::High),
            _ => None,
        }
    }
}

/// Named color bundles. `Custom` reads every color individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorPreset {
    Custom,
    #[default]
    Sky,
    Overcast,
    Rose,
    Sunset,
}

impl ColorPreset {
    fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(ColorPreset::Custom),
            1 => Some(ColorPreset::Sky),
            2 => Some(ColorPreset::Overcast),
            3 => Some(ColorPreset::Rose),
            4 => Some(ColorPreset::Sunset),
            _ => None,
        }
    }

    /// Colors of a named preset. `Custom` has no bundle of its own and yields the default scheme.
    pub fn scheme(self) -> ColorScheme {
        match self {
            ColorPreset::Custom | ColorPreset::Sky => ColorScheme {
                background_top: [0.6, 0.7, 0.9],
                background_bottom: [0.3, 0.4, 0.6],
                wave_front: [0.5, 0.6, 0.8],
                wave_back: [0.3, 0.4, 0.6],
                plane_fill: [0.8, 0.8, 0.8],
                plane_outline: [0.0, 0.0, 0.0],
                cloud_fill: [0.9, 0.9, 0.9],
                cloud_outline: [0.5, 0.5, 0.5],
            },
            ColorPreset::Overcast => ColorScheme {
                background_top: [0.7, 0.7, 0.7],
                background_bottom: [0.4, 0.4, 0.4],
                wave_front: [0.6, 0.6, 0.6],
                wave_back: [0.4, 0.4, 0.4],
                plane_fill: [0.8, 0.8, 0.8],
                plane_outline: [0.0, 0.0, 0.0],
                cloud_fill: [0.9, 0.9, 0.9],
                cloud_outline: [0.5, 0.5, 0.5],
            },
            ColorPreset::Rose => ColorScheme {
                background_top: [0.9, 0.6, 0.7],
                background_bottom: [0.6, 0.3, 0.4],
                wave_front: [0.8, 0.5, 0.6],
                wave_back: [0.6, 0.3, 0.4],
                plane_fill: [0.8, 0.8, 0.8],
                plane_outline: [0.0, 0.0, 0.0],
                cloud_fill: [1.0, 0.8, 0.85],
                cloud_outline: [0.7, 0.4, 0.45],
            },
            ColorPreset::Sunset => ColorScheme {
                background_top: [0.9, 0.6, 0.3],
                background_bottom: [0.6, 0.3, 0.1],
                wave_front: [0.7, 0.4, 0.1],
                wave_back: [0.6, 0.3, 0.1],
                plane_fill: [0.8, 0.8, 0.8],
                plane_outline: [0.0, 0.0, 0.0],
                cloud_fill: [0.9, 0.6, 0.3],
                cloud_outline: [0.6, 0.3, 0.1],
            },
        }
    }
}

/// Every color the scene paints with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScheme {
    pub background_top: Rgb,
    pub background_bottom: Rgb,
    pub wave_front: Rgb,
    pub wave_back: Rgb,
    pub plane_fill: Rgb,
    pub plane_outline: Rgb,
    pub cloud_fill: Rgb,
    pub cloud_outline: Rgb,
}

impl Default for ColorScheme {
    fn default() -> Self {
        ColorPreset::default().scheme()
    }
}

/// Quality, brightness and colors as consumed by the compositor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneConfig {
    pub quality: Quality,
    /// Brightness multiplier applied by the final blit (1.0 = unchanged).
    pub brightness: f32,
    pub colors: ColorScheme,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            brightness: BRIGHTNESS_DEFAULT as f32 / 100.0,
            colors: ColorScheme::default(),
        }
    }
}

/// Read-only string key/value store supplying user preferences.
pub trait PreferenceSource {
    fn get(&self, key: &str) -> Option<&str>;
}

impl PreferenceSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        HashMap::get(self, key).map(String::as_str)
    }
}

impl SceneConfig {
    /// Build a configuration from a preference store, defaulting anything unusable.
    pub fn from_preferences(prefs: &impl PreferenceSource) -> Self {
        let quality = read_index(prefs, KEY_QUALITY)
            .and_then(|i| Quality::from_index(i).or_else(|| warn_invalid(KEY_QUALITY, i)))
            .unwrap_or_default();

        let brightness_percent = read_index(prefs, KEY_BRIGHTNESS)
            .map(|percent| {
                let clamped = percent.clamp(BRIGHTNESS_MIN as i64, BRIGHTNESS_MAX as i64);
                if clamped != percent {
                    log::warn!("Brightness {}% out of range, clamped to {}%", percent, clamped);
                }
                clamped as u32
            })
            .unwrap_or(BRIGHTNESS_DEFAULT);

        let preset = read_index(prefs, KEY_SCHEME)
            .and_then(|i| ColorPreset::from_index(i).or_else(|| warn_invalid(KEY_SCHEME, i)))
            .unwrap_or_default();

        let colors = match preset {
            ColorPreset::Custom => custom_scheme(prefs),
            named => named.scheme(),
        };

        Self {
            quality,
            brightness: brightness_percent as f32 / 100.0,
            colors,
        }
    }
}

fn warn_invalid<T>(key: &str, value: i64) -> Option<T> {
    log::warn!("Preference {} has unknown value {}, using default", key, value);
    None
}

fn read_index(prefs: &impl PreferenceSource, key: &str) -> Option<i64> {
    let raw = prefs.get(key)?;
    match raw.trim().parse::<i64>() {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Preference {} = {:?} is not a number ({}), using default", key, raw, e);
            None
        }
    }
}

fn custom_scheme(prefs: &impl PreferenceSource) -> ColorScheme {
    let fallback = ColorScheme::default();
    let color = |key: &str, default: Rgb| -> Rgb {
        match prefs.get(key) {
            Some(raw) => parse_color(raw).unwrap_or_else(|| {
                log::warn!("Preference {} = {:?} is not a color, using default", key, raw);
                default
            }),
            None => default,
        }
    };
    ColorScheme {
        background_top: color(KEY_BG_TOP, fallback.background_top),
        background_bottom: color(KEY_BG_BOTTOM, fallback.background_bottom),
        wave_front: color(KEY_WAVE_FRONT, fallback.wave_front),
        wave_back: color(KEY_WAVE_BACK, fallback.wave_back),
        plane_fill: color(KEY_PLANE, fallback.plane_fill),
        plane_outline: color(KEY_PLANE_OUTLINE, fallback.plane_outline),
        cloud_fill: color(KEY_CLOUD, fallback.cloud_fill),
        cloud_outline: color(KEY_CLOUD_OUTLINE, fallback.cloud_outline),
    }
}

/// Parse a packed `0xAARRGGBB` color given as a (possibly negative) decimal
/// integer or as `#RRGGBB` / `#AARRGGBB` hex. Alpha is ignored.
pub fn parse_color(raw: &str) -> Option<Rgb> {
    let raw = raw.trim();
    let packed = if let Some(hex) = raw.strip_prefix('#') {
        match hex.len() {
            6 | 8 => u32::from_str_radix(hex, 16).ok()?,
            _ => return None,
        }
    } else {
        let value = raw.parse::<i64>().ok()?;
        if value < i32::MIN as i64 || value > u32::MAX as i64 {
            return None;
        }
        value as u32
    };
    Some(unpack_rgb(packed))
}

/// Split a packed `0xAARRGGBB` value into normalized RGB.
pub fn unpack_rgb(packed: u32) -> Rgb {
    let channel = |shift: u32| ((packed >> shift) & 0xFF) as f32 / 255.0;
    [channel(16), channel(8), channel(0)]
}
