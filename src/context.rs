use std::fmt;
use std::sync::{Arc, Weak};

/// Settings the edit engine consults at call time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSettings {
    pub diagnostics_enabled: bool,
    pub include_diagnostic_messages: bool,
    /// 0 means unlimited
    pub max_diagnostic_messages: usize,
    pub write_delay_ms: i64,
    pub cleanup_created_directories: bool,
    pub create_backups: bool,
}

impl Default for EditSettings {
    fn default() -> Self {
        EditSettings {
            diagnostics_enabled: true,
            include_diagnostic_messages: true,
            max_diagnostic_messages: 50,
            write_delay_ms: 1000,
            cleanup_created_directories: true,
            create_backups: false,
        }
    }
}

/// Anything that can answer "what are the settings right now".
pub trait SettingsSource: Send + Sync {
    fn edit_settings(&self) -> EditSettings;
}

/// The per-session view of the outside world handed to the components that
/// need settings. Holds the source weakly; once the owner is gone every
/// lookup falls back to the defaults.
#[derive(Clone, Default)]
pub struct SessionContext {
    settings: Option<Weak<dyn SettingsSource>>,
}

impl SessionContext {
    pub fn new(source: &Arc<dyn SettingsSource>) -> Self {
        SessionContext {
            settings: Some(Arc::downgrade(source)),
        }
    }

    /// A context with no settings owner at all.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn settings(&self) -> EditSettings {
        self.settings
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|source| source.edit_settings())
            .unwrap_or_default()
    }

    pub fn is_attached(&self) -> bool {
        self.settings
            .as_ref()
            .is_some_and(|source| source.strong_count() > 0)
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("attached", &self.is_attached())
            .finish()
    }
}
