pub mod error;

pub use error::*;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Directory that marks a project root
const PROJECT_DIR: &str = ".stackflow";
const PROJECT_FILE: &str = "project.json";
const SETTINGS_FILE: &str = "config.yaml";

pub const DEFAULT_STAGE: &str = "dev";
pub const DEFAULT_REGION: &str = "us-east-1";

/// StackFlow's per-user configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("stackflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Find the project root for `start`
///
/// Search order:
/// 1. `STACKFLOW_PROJECT_DIR` (used as-is)
/// 2. `start` and each of its ancestors holding `.stackflow/project.json`
pub fn find_project_root(start: &Path) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("STACKFLOW_PROJECT_DIR") {
        return Ok(PathBuf::from(dir));
    }

    start
        .ancestors()
        .find(|dir| dir.join(PROJECT_DIR).join(PROJECT_FILE).is_file())
        .map(Path::to_path_buf)
        .ok_or_else(|| ConfigError::ProjectRootNotFound(start.to_path_buf()))
}

/// User settings from `config.yaml`; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// AWS credentials profile
    pub profile: Option<String>,
    /// Stage used when a command does not name one
    pub stage: Option<String>,
    /// Region used when a command does not name one
    pub region: Option<String>,
    pub poll: PollSettings,
}

/// Stack status polling
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Give up once the accumulated wait exceeds this
    pub timeout_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2_000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            timeout_secs: 30 * 60,
        }
    }
}

impl PollSettings {
    /// Reject settings under which a stack wait could never time out
    fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.initial_delay_ms == 0 {
            return Err("poll.initial_delay_ms must be greater than 0");
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err("poll.max_delay_ms must not be below poll.initial_delay_ms");
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err("poll.multiplier must be at least 1");
        }
        if self.timeout_secs == 0 {
            return Err("poll.timeout_secs must be greater than 0");
        }
        Ok(())
    }
}

impl Settings {
    /// Load settings
    ///
    /// `STACKFLOW_CONFIG_PATH` wins over `<config_dir>/stackflow/config.yaml`.
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = match std::env::var("STACKFLOW_CONFIG_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => get_config_dir()?.join(SETTINGS_FILE),
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Settings file not found at {}", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let invalid = |message: String| ConfigError::InvalidSettings {
            path: path.to_path_buf(),
            message,
        };
        let settings: Self =
            serde_yaml::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        settings.poll.validate().map_err(|reason| invalid(reason.to_string()))?;
        Ok(settings)
    }

    pub fn stage_or_default(&self) -> &str {
        self.stage.as_deref().unwrap_or(DEFAULT_STAGE)
    }

    pub fn region_or_default(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }
}
