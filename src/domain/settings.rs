use crate::domain::interpolation::{FadePolicy, InterpolationPolicy};
use crate::infrastructure::bluetooth::session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "coyote_sync".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Added to every timeline sample; may be negative.
    #[serde(default)]
    pub offset_millis: i64,

    // Fade policy
    #[serde(default = "default_true")]
    pub pause_fade_enabled: bool,
    #[serde(default = "default_pause_duration_ms")]
    pub pause_duration_ms: u64,
    #[serde(default = "default_fade_duration_ms")]
    pub fade_duration_ms: u64,
    #[serde(default = "default_max_amplitude")]
    pub max_amplitude: f64,

    // Scheduling
    #[serde(default = "default_retransmit_period_ms")]
    pub retransmit_period_ms: u64,
    #[serde(default = "default_frame_period_ms")]
    pub frame_period_ms: u64,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            offset_millis: 0,
            pause_fade_enabled: default_true(),
            pause_duration_ms: default_pause_duration_ms(),
            fade_duration_ms: default_fade_duration_ms(),
            max_amplitude: default_max_amplitude(),
            retransmit_period_ms: default_retransmit_period_ms(),
            frame_period_ms: default_frame_period_ms(),
            log_settings: LogSettings::default(),
        }
    }
}

fn default_pause_duration_ms() -> u64 {
    2500
}
fn default_fade_duration_ms() -> u64 {
    300
}
fn default_max_amplitude() -> f64 {
    20.0
}
fn default_retransmit_period_ms() -> u64 {
    100
}
fn default_frame_period_ms() -> u64 {
    16
}

impl Settings {
    pub fn interpolation_policy(&self) -> InterpolationPolicy {
        InterpolationPolicy {
            max_amplitude: self.max_amplitude,
            fade: FadePolicy {
                enabled: self.pause_fade_enabled,
                pause_duration_ms: self.pause_duration_ms as f64,
                fade_duration_ms: self.fade_duration_ms as f64,
            },
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            retransmit_period: Duration::from_millis(self.retransmit_period_ms.max(1)),
        }
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(self.frame_period_ms.max(1))
    }
}

/// Read-only access to the user's settings file.
pub struct SettingsService {
    settings: Settings,
    settings_path: Option<PathBuf>,
}

impl SettingsService {
    /// Loads `settings.json` from the platform config directory, or defaults.
    pub fn new() -> Self {
        let settings_path = Self::get_settings_path();
        let settings = match settings_path.as_deref() {
            Some(path) if path.exists() => Self::load_from_file(path).unwrap_or_else(|e| {
                warn!("Ignoring unreadable settings {}: {}", path.display(), e);
                Settings::default()
            }),
            _ => Settings::default(),
        };

        Self {
            settings,
            settings_path,
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let settings = Self::load_from_file(&path)?;
        Ok(Self {
            settings,
            settings_path: Some(path),
        })
    }

    fn get_settings_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("CoyoteSync");
        path.push("settings.json");
        Some(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn path(&self) -> Option<&Path> {
        self.settings_path.as_deref()
    }
}

impl Default for SettingsService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"offset_millis": -120}"#).unwrap();
        assert_eq!(settings.offset_millis, -120);
        assert_eq!(settings.pause_duration_ms, 2500);
        assert_eq!(settings.fade_duration_ms, 300);
        assert_eq!(settings.retransmit_period_ms, 100);
        assert!(settings.pause_fade_enabled);
        assert_eq!(settings.log_settings, LogSettings::default());
    }

    #[test]
    fn test_policy_projection() {
        let settings = Settings {
            max_amplitude: 15.0,
            pause_fade_enabled: false,
            ..Default::default()
        };
        let policy = settings.interpolation_policy();
        assert_eq!(policy.max_amplitude, 15.0);
        assert!(!policy.fade.enabled);
        assert_eq!(policy.fade.fade_duration_ms, 300.0);
        assert_eq!(
            settings.session_config().retransmit_period,
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_from_path_reads_file() {
        let path = std::env::temp_dir().join(format!(
            "coyote_sync_settings_{}.json",
            std::process::id()
        ));
        fs::write(&path, r#"{"max_amplitude": 12.0, "frame_period_ms": 20}"#).unwrap();

        let service = SettingsService::from_path(&path).unwrap();
        assert_eq!(service.get().max_amplitude, 12.0);
        assert_eq!(service.get().frame_period(), Duration::from_millis(20));
        assert_eq!(service.path(), Some(path.as_path()));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_from_path_rejects_malformed_json() {
        let path = std::env::temp_dir().join(format!(
            "coyote_sync_bad_settings_{}.json",
            std::process::id()
        ));
        fs::write(&path, "{ not json").unwrap();
        assert!(SettingsService::from_path(&path).is_err());
        fs::remove_file(&path).unwrap();
    }
}
