use crate::error::PetError;
use bevy::log::Level;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const CONFIG_FILE: &str = "desktop_cat.json";
const CONFIG_ENV: &str = "DESKTOP_CAT_CONFIG";
const LOG_ENV: &str = "DESKTOP_CAT_LOG";

// Keeps GPU backend chatter out of the default output.
const DEFAULT_LOG_FILTER: &str = "wgpu=error,naga=warn";

/// Tunables for the pet. Every field has a default, so a config file only
/// needs to name what it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PetConfig {
    /// Edge length of the square overlay window and sprite, in px.
    pub sprite_size: i32,
    /// Height of the roaming band measured up from the work area bottom.
    pub zone_height: i32,
    /// Gap kept between the sprite and the work area bottom.
    pub bottom_margin: i32,

    pub tick_ms: u64,
    pub position_interval_ms: u64,
    pub mood_interval_ms: u64,
    pub behavior_min_ms: u64,
    pub behavior_max_ms: u64,

    /// Idle time after which the pet falls asleep.
    pub sleep_after_ms: u64,
    /// Idle time under which a sleeping pet wakes up. Must stay below
    /// `sleep_after_ms` so the two thresholds leave a dead zone.
    pub wake_within_ms: u64,
    pub happy_revert_ms: u64,

    /// Number of `next_frame` calls per walk-cycle step.
    pub walk_frame_throttle: u32,

    pub placement_retry_ms: u64,
    pub placement_check_ms: u64,
    pub bounds_refresh_ms: u64,

    pub sprite_dir: PathBuf,
    /// Per-mood art, `{breed}/cat_{mood}.png` and shared `cat_{mood}.png`.
    pub mood_sprite_dir: PathBuf,
    pub start_position: (i32, i32),

    /// Program (and arguments) launched when the chat is requested.
    pub chat_command: Option<Vec<String>>,
}

impl Default for PetConfig {
    fn default() -> Self {
        Self {
            sprite_size: 128,
            zone_height: 320,
            bottom_margin: 12,
            tick_ms: 50,
            position_interval_ms: 50,
            mood_interval_ms: 5_000,
            behavior_min_ms: 3_000,
            behavior_max_ms: 8_000,
            sleep_after_ms: 30_000,
            wake_within_ms: 5_000,
            happy_revert_ms: 2_000,
            walk_frame_throttle: 10,
            placement_retry_ms: 500,
            placement_check_ms: 3_000,
            bounds_refresh_ms: 10_000,
            sprite_dir: PathBuf::from("sprites_hd"),
            mood_sprite_dir: PathBuf::from("sprites"),
            start_position: (300, 300),
            chat_command: None,
        }
    }
}

impl PetConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn sleep_after(&self) -> Duration {
        Duration::from_millis(self.sleep_after_ms)
    }

    pub fn wake_within(&self) -> Duration {
        Duration::from_millis(self.wake_within_ms)
    }

    pub fn happy_revert(&self) -> Duration {
        Duration::from_millis(self.happy_revert_ms)
    }

    pub fn from_json(path: &Path, text: &str) -> Result<Self, PetError> {
        let config: Self = serde_json::from_str(text).map_err(|e| PetError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validated(path)
    }

    fn validated(self, path: &Path) -> Result<Self, PetError> {
        let invalid = |reason: &str| PetError::Config {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        if self.sprite_size <= 0 {
            return Err(invalid("sprite_size must be positive"));
        }
        if self.behavior_min_ms > self.behavior_max_ms {
            return Err(invalid("behavior_min_ms exceeds behavior_max_ms"));
        }
        if self.wake_within_ms >= self.sleep_after_ms {
            return Err(invalid("wake_within_ms must be below sleep_after_ms"));
        }
        Ok(self)
    }

    /// Loads the config file named by `DESKTOP_CAT_CONFIG`, or
    /// `desktop_cat.json` in the working directory. A missing file means
    /// defaults; a broken one is reported and also means defaults.
    pub fn load() -> Self {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
        match std::fs::read_to_string(&path) {
            Ok(text) => match Self::from_json(&path, &text) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                }
                Err(err) => {
                    warn!("{err}; using defaults");
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                warn!("{}; using defaults", PetError::from(err));
                Self::default()
            }
        }
    }
}

/// Log verbosity for the `LogPlugin`, read once at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct LogSettings {
    pub level: Level,
    pub filter: String,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_ENV).ok().as_deref())
    }

    /// A bare level name sets the level; anything else is taken as a filter
    /// directive string.
    pub fn parse(value: Option<&str>) -> Self {
        let value = value.map(str::trim).filter(|v| !v.is_empty());
        match value {
            None => Self {
                level: Level::INFO,
                filter: DEFAULT_LOG_FILTER.to_string(),
            },
            Some(v) => match Level::from_str(v) {
                Ok(level) => Self {
                    level,
                    filter: DEFAULT_LOG_FILTER.to_string(),
                },
                Err(_) => Self {
                    level: Level::INFO,
                    filter: v.to_string(),
                },
            },
        }
    }
}
