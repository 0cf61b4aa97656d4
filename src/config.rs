//! Spawn configuration and the optional JSON override file.
//!
//! The simulation always starts from a [`SpawnConfig`] supplied by the caller.
//! A `configuration.json` file may override `count`, `maxSize` and
//! `robotSpeed`. A missing file is not an error; an unreadable or malformed
//! one is reported and the defaults are used.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Default file name looked up when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "configuration.json";

/// Seed of the spawner's position generator.
pub const DEFAULT_SPAWN_SEED: u64 = 1000;

/// Singleton read by the spawner and every movement stage.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct SpawnConfig {
    /// Number of robots, and separately of items, to spawn.
    pub count: usize,
    /// Edge length of the square spawn/drop area centred on the origin.
    pub max_size: f32,
    /// Robot movement speed in world units per second.
    pub robot_speed: f32,
    /// Seed for spawn positions.
    pub seed: u64,
    /// Fixed timestep used by `SimWorld::step`.
    pub fixed_timestep: f32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            count: 1000,
            max_size: 100.0,
            robot_speed: 10.0,
            seed: DEFAULT_SPAWN_SEED,
            fixed_timestep: 1.0 / 60.0,
        }
    }
}

impl SpawnConfig {
    /// Copy the overridable fields from `file`.
    pub fn apply_override(&mut self, file: &ConfigOverride) {
        self.count = file.count;
        self.max_size = file.max_size;
        self.robot_speed = file.robot_speed;
    }
}

/// Camera position carried by the config file. Unused by the simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Contents of `configuration.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverride {
    pub count: usize,
    pub max_size: f32,
    pub robot_speed: f32,
    #[serde(default)]
    pub camera_position: Option<CameraPosition>,
}

/// Outcome of configuration loading, inserted before the spawner may run.
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct ConfigResolution(pub Option<ConfigOverride>);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file {path} is malformed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Load an override file. `Ok(None)` when the file does not exist.
pub fn load_override(path: &Path) -> Result<Option<ConfigOverride>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_override(&text)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Parse override JSON text.
pub fn parse_override(text: &str) -> Result<ConfigOverride, serde_json::Error> {
    serde_json::from_str(text)
}

/// Load `path` and fall back to no override on any failure.
pub fn resolve_override(path: &Path) -> ConfigResolution {
    match load_override(path) {
        Ok(Some(file)) => {
            info!(path = %path.display(), count = file.count, "loaded config override");
            ConfigResolution(Some(file))
        }
        Ok(None) => {
            info!(path = %path.display(), "no config file, using defaults");
            ConfigResolution(None)
        }
        Err(err) => {
            warn!(error = %err, "ignoring config file, using defaults");
            ConfigResolution(None)
        }
    }
}

/// Config path from command-line arguments: `--config <path>` or
/// `-configPath <path>`, otherwise [`DEFAULT_CONFIG_FILE`].
pub fn config_path_from_args<I, S>(args: I) -> PathBuf
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let arg = arg.as_ref();
        if arg == "--config" || arg.contains("-configPath") {
            if let Some(value) = args.next() {
                return PathBuf::from(value.as_ref());
            }
        }
    }
    PathBuf::from(DEFAULT_CONFIG_FILE)
}
