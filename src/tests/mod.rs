pub mod coordinator_tests;
pub mod direct_save_tests;
pub mod save_exactness_tests;

use std::sync::Arc;
use tempfile::TempDir;
use test_context::AsyncTestContext;

use crate::config::{Config, SharedConfig};
use crate::context::{SessionContext, SettingsSource};
use crate::fs::{FileSystem, LocalFileSystem};
use crate::integrations::editor::DiffViewProvider;
use crate::integrations::headless::HeadlessHost;

// Common test utilities and helpers
pub(crate) mod test_utils {
    use super::*;

    /// Settings with no write delay so tests don't sleep.
    pub fn fast_config() -> SharedConfig {
        let shared = SharedConfig::new(Config::default());
        shared.update(|config| config.diagnostics.write_delay_ms = 0);
        shared
    }
}

/// A temporary workspace with a headless editor and a coordinator over it.
pub struct EditorContext {
    pub temp_dir: TempDir,
    pub host: Arc<HeadlessHost>,
    pub config: SharedConfig,
    /// Owner of the settings the provider only holds weakly
    pub settings: Arc<dyn SettingsSource>,
    pub provider: DiffViewProvider,
}

impl EditorContext {
    /// Build around an existing directory and file gateway.
    pub fn in_dir(temp_dir: TempDir, fs: Arc<dyn FileSystem>) -> Self {
        let host = Arc::new(HeadlessHost::new());
        let config = test_utils::fast_config();
        let settings: Arc<dyn SettingsSource> = Arc::new(config.clone());
        let provider = DiffViewProvider::new(
            host.clone(),
            fs,
            temp_dir.path(),
            SessionContext::new(&settings),
        );
        EditorContext {
            temp_dir,
            host,
            config,
            settings,
            provider,
        }
    }

    pub fn path(&self, rel_path: &str) -> std::path::PathBuf {
        self.temp_dir.path().join(rel_path)
    }

    pub fn write(&self, rel_path: &str, content: &str) {
        std::fs::write(self.path(rel_path), content).unwrap();
    }

    pub fn read(&self, rel_path: &str) -> String {
        std::fs::read_to_string(self.path(rel_path)).unwrap()
    }
}

#[async_trait::async_trait]
impl AsyncTestContext for EditorContext {
    async fn setup() -> Self {
        EditorContext::in_dir(TempDir::new().unwrap(), Arc::new(LocalFileSystem::new()))
    }

    async fn teardown(self) {
        let mut provider = self.provider;
        provider.dispose();
    }
}
