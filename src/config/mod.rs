// Configuration management for shufflecast
// Handles loading/saving settings, with sensible defaults when config is missing

use anyhow::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::media::DEFAULT_EXTENSIONS;
use crate::playback::ErrorPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scanner: ScannerConfig,
    pub playback: PlaybackConfig,
    pub player: PlayerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub extensions: Vec<String>,
    pub recursive: bool,
    pub fatal_backoff_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub tick_interval_ms: u64,
    pub seed_poll_interval_ms: u64,
    /// Items needed before playback starts; unset picks 3 for recursive scans, 1 otherwise
    pub min_start_items: Option<usize>,
    /// Force a regeneration when the last one is older than this
    pub staleness_window_seconds: Option<u64>,
    pub idle_timeout_seconds: u64,
    pub repeat: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub on_error: ErrorPolicy,
    pub max_consecutive_errors: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            recursive: true,
            fatal_backoff_seconds: 10,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            seed_poll_interval_ms: 500,
            min_start_items: None,
            staleness_window_seconds: None,
            idle_timeout_seconds: 5,
            repeat: true,
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            command: "mpv".to_string(),
            args: vec!["--really-quiet".to_string()],
            on_error: ErrorPolicy::Skip,
            max_consecutive_errors: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: dirs::data_local_dir()
                .map(|dir| dir.join("shufflecast").join("logs"))
                .unwrap_or_else(|| PathBuf::from("logs")),
        }
    }
}

impl PlaybackConfig {
    pub fn min_start_items(&self, recursive: bool) -> usize {
        self.min_start_items
            .unwrap_or(if recursive { 3 } else { 1 })
            .max(1)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn seed_poll_interval(&self) -> Duration {
        Duration::from_millis(self.seed_poll_interval_ms.max(1))
    }

    pub fn staleness_window(&self) -> Option<Duration> {
        self.staleness_window_seconds.map(Duration::from_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }
}

impl ScannerConfig {
    pub fn fatal_backoff(&self) -> Duration {
        Duration::from_secs(self.fatal_backoff_seconds)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Read `path`, writing the defaults there first if it does not exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("shufflecast");

        Ok(config_dir.join("config.toml"))
    }
}
