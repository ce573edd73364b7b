use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compiler::DEFAULT_LANE_COUNT;
use crate::Result;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub volume: VolumeConfig,
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(json)?;
        config.volume = config.volume.clamped();
        Ok(config)
    }

    /// Reads a JSON configuration file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Configuration of the compiler and the playback loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of parallel lanes a row is allowed to fill.
    pub lane_count: usize,
    /// Polling interval of the autoplay loop, in milliseconds.
    pub tick_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lane_count: DEFAULT_LANE_COUNT,
            tick_ms: 5,
        }
    }
}

/// Initial values of the three gain buses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub master: f32,
    pub music: f32,
    pub sound: f32,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            master: 1.0,
            music: 1.0,
            sound: 1.0,
        }
    }
}

impl VolumeConfig {
    fn clamped(self) -> Self {
        Self {
            master: self.master.clamp(0.0, 1.0),
            music: self.music.clamp(0.0, 1.0),
            sound: self.sound.clamp(0.0, 1.0),
        }
    }
}
