//! Engine configuration.
//!
//! [`EngineConfig`] is read once at start-up. Every field has a default, so a
//! config file only needs to name the options it changes:
//!
//! ```
//! use parkworks_engine::config::EngineConfig;
//!
//! let config: EngineConfig = serde_json::from_str(r#"{ "uncap_fps": true }"#).unwrap();
//! assert!(config.uncap_fps);
//! assert_eq!(config.autosave_amount, EngineConfig::default().autosave_amount);
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Renderer to create at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawingEngineKind {
    Software,
    SoftwareWithHardwareDisplay,
    OpenGl,
}

/// How often the park is saved automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutosaveFrequency {
    EveryMinute,
    Every5Minutes,
    Every15Minutes,
    Every30Minutes,
    EveryHour,
    Never,
}

impl AutosaveFrequency {
    /// Interval in milliseconds, or `None` for [`AutosaveFrequency::Never`].
    pub fn interval_ms(self) -> Option<u64> {
        let minutes = match self {
            AutosaveFrequency::EveryMinute => 1,
            AutosaveFrequency::Every5Minutes => 5,
            AutosaveFrequency::Every15Minutes => 15,
            AutosaveFrequency::Every30Minutes => 30,
            AutosaveFrequency::EveryHour => 60,
            AutosaveFrequency::Never => return None,
        };
        Some(minutes * 60 * 1000)
    }
}

/// Configuration for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Render as fast as possible and interpolate entity positions between
    /// ticks.
    pub uncap_fps: bool,
    /// No window, no drawing.
    pub headless: bool,
    /// A headless server with nobody connected stops simulating.
    pub pause_server_if_no_clients: bool,
    /// Capture per-tick snapshots on the server and exchange them on desync.
    pub desync_debugging: bool,
    /// Stay connected after a desync is detected.
    pub stay_connected: bool,
    /// Unlocks the highest game speed.
    pub debugging_tools: bool,
    /// Real time between autosaves.
    pub autosave_frequency: AutosaveFrequency,
    /// Autosave files kept before the oldest is deleted.
    pub autosave_amount: usize,
    /// Where desync reports are written.
    pub desync_log_dir: PathBuf,
    /// Ticks between state checksums in a replay recording.
    pub replay_checksum_interval: u32,
    /// Preferred renderer. Software is the fallback.
    pub drawing_engine: DrawingEngineKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            uncap_fps: false,
            headless: false,
            pause_server_if_no_clients: false,
            desync_debugging: false,
            stay_connected: true,
            debugging_tools: false,
            autosave_frequency: AutosaveFrequency::Every5Minutes,
            autosave_amount: 10,
            desync_log_dir: PathBuf::from("desyncs"),
            replay_checksum_interval: 40,
            drawing_engine: DrawingEngineKind::Software,
        }
    }
}

impl EngineConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.to_owned(),
            source,
        })?;
        let config: EngineConfig =
            serde_json::from_str(&text).map_err(|source| EngineError::ConfigParse {
                path: path.to_owned(),
                source,
            })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Write the config as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).expect("EngineConfig should always be JSON-serializable");
        std::fs::write(path, json).map_err(|source| EngineError::ConfigIo {
            path: path.to_owned(),
            source,
        })
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.autosave_amount == 0 {
            return Err(EngineError::InvalidConfig(
                "autosave_amount must be at least 1".into(),
            ));
        }
        if self.replay_checksum_interval == 0 {
            return Err(EngineError::InvalidConfig(
                "replay_checksum_interval must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_autosave_amount_rejected() {
        let config = EngineConfig {
            autosave_amount: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn autosave_intervals() {
        assert_eq!(AutosaveFrequency::EveryMinute.interval_ms(), Some(60_000));
        assert_eq!(AutosaveFrequency::EveryHour.interval_ms(), Some(3_600_000));
        assert_eq!(AutosaveFrequency::Never.interval_ms(), None);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = EngineConfig {
            uncap_fps: true,
            autosave_frequency: AutosaveFrequency::Never,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EngineConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, EngineError::ConfigIo { .. }));
    }
}
