use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::context::{EditSettings, SettingsSource};
use crate::error::EditError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub app_name: String,
    pub log_level: LogLevel,
    pub diagnostics: DiagnosticsConfig,
    pub diff_view: DiffViewConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Run the before/after diagnostics comparison on save.
    pub enabled: bool,
    /// Include formatted problems in the save result.
    pub include_messages: bool,
    /// Upper bound on reported problems; 0 means unlimited.
    pub max_messages: usize,
    /// Time given to linters and compilers to react to a write.
    pub write_delay_ms: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DiffViewConfig {
    pub cleanup_created_directories: bool,
    pub create_backups: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        DiagnosticsConfig {
            enabled: true,
            include_messages: true,
            max_messages: 50,
            write_delay_ms: 1000,
        }
    }
}

impl Default for DiffViewConfig {
    fn default() -> Self {
        DiffViewConfig {
            cleanup_created_directories: true,
            create_backups: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            app_name: "redline".to_string(),
            log_level: LogLevel::Info,
            diagnostics: DiagnosticsConfig::default(),
            diff_view: DiffViewConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edit_settings(&self) -> EditSettings {
        EditSettings {
            diagnostics_enabled: self.diagnostics.enabled,
            include_diagnostic_messages: self.diagnostics.include_messages,
            max_diagnostic_messages: self.diagnostics.max_messages,
            write_delay_ms: self.diagnostics.write_delay_ms,
            cleanup_created_directories: self.diff_view.cleanup_created_directories,
            create_backups: self.diff_view.create_backups,
        }
    }

    pub fn load(path: &Path) -> Result<Self, EditError> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|e| EditError::io(path, e))?;

        serde_json::from_str(&content).map_err(|e| EditError::InvalidConfiguration(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), EditError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| EditError::io(parent, e))?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;

        fs::write(path, content).map_err(|e| EditError::io(path, e))
    }
}

/// Live, shareable configuration. Readers always observe the latest value.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<Config>>,
}

impl SharedConfig {
    pub fn new(config: Config) -> Self {
        SharedConfig {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn snapshot(&self) -> Config {
        self.inner.read().clone()
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Config),
    {
        f(&mut self.inner.write());
    }
}

impl SettingsSource for SharedConfig {
    fn edit_settings(&self) -> EditSettings {
        self.inner.read().edit_settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(&temp.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/redline.json");

        let mut config = Config::default();
        config.diagnostics.max_messages = 5;
        config.log_level = LogLevel::Debug;
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("partial.json");
        fs::write(&path, r#"{ "diagnostics": { "write_delay_ms": 0 } }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.diagnostics.write_delay_ms, 0);
        assert_eq!(config.diagnostics.max_messages, 50);
        assert!(config.diff_view.cleanup_created_directories);
    }

    #[test]
    fn test_invalid_file_is_configuration_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(EditError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_shared_config_reads_latest() {
        let shared = SharedConfig::new(Config::default());
        assert_eq!(shared.edit_settings().max_diagnostic_messages, 50);

        shared.update(|config| config.diagnostics.max_messages = 3);
        assert_eq!(shared.edit_settings().max_diagnostic_messages, 3);
    }
}
