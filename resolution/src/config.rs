//! Engine configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then
//! `RESOLUTION_*` environment variables. The CLI applies its flags last.
//!
//! ```toml
//! state_path = "/var/lib/resolution/state.json"
//! event_capacity = 512
//!
//! [justification]
//! monitor_min_chars = 30
//! stop_min_chars = 50
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ResolutionError, ResolutionResult};
use crate::escalation::JustificationRule;
use crate::events::DEFAULT_CHANNEL_CAPACITY;

/// Configuration for the resolution engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum justification lengths
    pub justification: JustificationRule,
    /// JSON snapshot used by the CLI between invocations
    pub state_path: PathBuf,
    /// Broadcast capacity of the event bus
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            justification: JustificationRule::default(),
            state_path: PathBuf::from(".resolution-state.json"),
            event_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply `RESOLUTION_*` overrides; unparsable values are ignored
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("RESOLUTION_MONITOR_MIN_JUSTIFICATION") {
            if let Ok(n) = val.parse() {
                self.justification.monitor_min_chars = n;
            }
        }
        if let Ok(val) = std::env::var("RESOLUTION_STOP_MIN_JUSTIFICATION") {
            if let Ok(n) = val.parse() {
                self.justification.stop_min_chars = n;
            }
        }
        if let Ok(path) = std::env::var("RESOLUTION_STATE_PATH") {
            self.state_path = PathBuf::from(path);
        }
        if let Ok(val) = std::env::var("RESOLUTION_EVENT_CAPACITY") {
            if let Ok(n) = val.parse() {
                self.event_capacity = n;
            }
        }
    }

    pub fn from_toml_str(content: &str, origin: &Path) -> ResolutionResult<Self> {
        toml::from_str(content).map_err(|e| ResolutionError::Config {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> ResolutionResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ResolutionError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content, path)
    }

    /// File (when given) then environment
    pub fn load(path: Option<&Path>) -> ResolutionResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.justification.monitor_min_chars, 30);
        assert_eq!(config.justification.stop_min_chars, 50);
        assert_eq!(config.event_capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml_str(
            "[justification]\nstop_min_chars = 80\n",
            Path::new("inline.toml"),
        )
        .unwrap();
        assert_eq!(config.justification.stop_min_chars, 80);
        assert_eq!(config.justification.monitor_min_chars, 30);
        assert_eq!(config.state_path, PathBuf::from(".resolution-state.json"));
    }

    #[test]
    fn test_invalid_toml_reports_path() {
        let err = EngineConfig::from_toml_str("event_capacity = \"lots\"", Path::new("bad.toml"))
            .unwrap_err();
        match err {
            ResolutionError::Config { path, .. } => assert_eq!(path, PathBuf::from("bad.toml")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resolution.toml");
        std::fs::write(&path, "state_path = \"/tmp/state.json\"\nevent_capacity = 16\n").unwrap();

        let config = EngineConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.state_path, PathBuf::from("/tmp/state.json"));
        assert_eq!(config.event_capacity, 16);
    }
}
