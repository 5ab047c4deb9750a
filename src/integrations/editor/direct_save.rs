use metrics::counter;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

use crate::error::EditError;
use crate::fs::{FileSystem, paths_equal, resolve_absolute_path};
use crate::integrations::diagnostics::DiagnosticsSnapshotter;
use crate::integrations::editor::session::{EditKind, SaveResult};
use crate::integrations::host::{EditorHost, ShowOptions};
use crate::text::{detect_line_ending, normalize_eol, strip_all_boms};

/// Lines longer than this are flagged as suspicious.
pub const MAX_REASONABLE_LINE_LENGTH: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectSaveOptions {
    /// Show the file afterwards; otherwise it is opened and saved in the background.
    pub open_file: bool,
    pub diagnostics_enabled: bool,
    pub write_delay_ms: i64,
    pub create_backup: bool,
}

impl Default for DirectSaveOptions {
    fn default() -> Self {
        Self {
            open_file: true,
            diagnostics_enabled: true,
            write_delay_ms: 1000,
            create_backup: false,
        }
    }
}

/// Something about the content that looks wrong. Never blocks the save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentWarning {
    Empty,
    NulBytes,
    LongLine { line: usize, length: usize },
}

impl fmt::Display for ContentWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentWarning::Empty => write!(f, "content is empty"),
            ContentWarning::NulBytes => write!(f, "content contains NUL bytes and may be binary"),
            ContentWarning::LongLine { line, length } => {
                write!(f, "line {} is {} characters long", line, length)
            }
        }
    }
}

pub fn check_content(content: &str) -> Vec<ContentWarning> {
    let mut warnings = Vec::new();
    if content.is_empty() {
        warnings.push(ContentWarning::Empty);
        return warnings;
    }
    if content.contains('\0') {
        warnings.push(ContentWarning::NulBytes);
    }
    if let Some((idx, line)) = content
        .lines()
        .enumerate()
        .find(|(_, line)| line.chars().count() > MAX_REASONABLE_LINE_LENGTH)
    {
        warnings.push(ContentWarning::LongLine {
            line: idx + 1,
            length: line.chars().count(),
        });
    }
    warnings
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectSaveOutcome {
    pub edit_kind: EditKind,
    pub result: SaveResult,
    pub backup_path: Option<PathBuf>,
    pub warnings: Vec<ContentWarning>,
}

fn backup_path_for(path: &Path) -> PathBuf {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0);
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".backup.{}", millis));
    PathBuf::from(name)
}

/// Writes content straight to disk without a comparison view.
pub struct DirectSaver {
    host: Arc<dyn EditorHost>,
    fs: Arc<dyn FileSystem>,
    cwd: PathBuf,
}

impl DirectSaver {
    pub fn new(host: Arc<dyn EditorHost>, fs: Arc<dyn FileSystem>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            host,
            fs,
            cwd: cwd.into(),
        }
    }

    pub async fn save_directly(
        &self,
        rel_path: &str,
        content: &str,
        diagnostics: &mut DiagnosticsSnapshotter,
        options: DirectSaveOptions,
    ) -> Result<DirectSaveOutcome, EditError> {
        let abs_path = resolve_absolute_path(&self.cwd, rel_path);
        let exists = self.fs.file_exists(&abs_path).await;
        let edit_kind = if exists { EditKind::Modify } else { EditKind::Create };

        let warnings = check_content(content);
        for warning in &warnings {
            warn!("Saving {} anyway: {}", rel_path, warning);
        }

        let backup_path = if options.create_backup && exists {
            let backup = backup_path_for(&abs_path);
            self.fs.copy_file(&abs_path, &backup).await?;
            Some(backup)
        } else {
            None
        };

        if !exists {
            self.fs.create_directories_for_file(&abs_path).await?;
        }
        if options.diagnostics_enabled {
            diagnostics.capture_diagnostics();
        }

        let stripped = strip_all_boms(content);
        let normalized = normalize_eol(&stripped, detect_line_ending(&stripped));
        self.fs.write_file(&abs_path, &normalized).await?;

        if options.open_file {
            let show = ShowOptions {
                preview: false,
                preserve_focus: false,
            };
            if let Err(e) = self.host.show_text_document(&abs_path, show).await {
                warn!("Could not show {}: {}", abs_path.display(), e);
            }
        } else {
            self.touch_in_background(&abs_path).await;
        }

        let new_problems = if options.diagnostics_enabled {
            diagnostics
                .process_new_diagnostics(options.write_delay_ms, &self.cwd)
                .await
        } else {
            String::new()
        };

        counter!("redline.direct.saved", 1);
        info!("Saved {} directly ({})", rel_path, edit_kind.past_tense());

        Ok(DirectSaveOutcome {
            edit_kind,
            result: SaveResult {
                new_problems_message: (!new_problems.is_empty()).then_some(new_problems),
                user_edits: None,
                final_content: Some(normalized),
            },
            backup_path,
            warnings,
        })
    }

    /// Open the document so language services see it, saving only if the host holds unsaved changes.
    async fn touch_in_background(&self, abs_path: &Path) {
        if let Err(e) = self.host.open_text_document(abs_path).await {
            warn!("Background open of {} failed: {}", abs_path.display(), e);
            return;
        }
        let dirty = self
            .host
            .text_documents()
            .iter()
            .any(|document| document.is_dirty && paths_equal(&document.path, abs_path));
        if dirty {
            if let Err(e) = self.host.save_document(abs_path).await {
                warn!("Background save of {} failed: {}", abs_path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SessionContext;
    use crate::fs::LocalFileSystem;
    use crate::integrations::headless::HeadlessHost;
    use tempfile::TempDir;

    fn quiet(open_file: bool, create_backup: bool) -> DirectSaveOptions {
        DirectSaveOptions {
            open_file,
            diagnostics_enabled: false,
            write_delay_ms: 0,
            create_backup,
        }
    }

    #[test]
    fn test_content_checks() {
        assert_eq!(check_content(""), vec![ContentWarning::Empty]);
        assert_eq!(check_content("a\0b"), vec![ContentWarning::NulBytes]);
        let long = "x".repeat(MAX_REASONABLE_LINE_LENGTH + 1);
        assert_eq!(
            check_content(&format!("ok\n{}\n", long)),
            vec![ContentWarning::LongLine {
                line: 2,
                length: MAX_REASONABLE_LINE_LENGTH + 1
            }]
        );
        assert!(check_content("fn main() {}\n").is_empty());
    }

    #[tokio::test]
    async fn test_direct_save_creates_nested_file() {
        let temp = TempDir::new().unwrap();
        let host = Arc::new(HeadlessHost::new());
        let saver = DirectSaver::new(host.clone(), Arc::new(LocalFileSystem::new()), temp.path());
        let mut diagnostics = DiagnosticsSnapshotter::new(host.clone(), SessionContext::detached());

        let outcome = saver
            .save_directly("a/b/new.txt", "\u{FEFF}one\r\ntwo\n", &mut diagnostics, quiet(true, false))
            .await
            .unwrap();

        let path = temp.path().join("a/b/new.txt");
        assert_eq!(outcome.edit_kind, EditKind::Create);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\r\ntwo\r\n");
        assert_eq!(outcome.result.final_content.as_deref(), Some("one\r\ntwo\r\n"));
        assert!(host.editor_for(&path).is_some());
    }

    #[tokio::test]
    async fn test_direct_save_backs_up_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.json");
        std::fs::write(&path, "{}").unwrap();

        let host = Arc::new(HeadlessHost::new());
        let saver = DirectSaver::new(host.clone(), Arc::new(LocalFileSystem::new()), temp.path());
        let mut diagnostics = DiagnosticsSnapshotter::new(host.clone(), SessionContext::detached());

        let outcome = saver
            .save_directly("data.json", "{\"a\": 1}\n", &mut diagnostics, quiet(false, true))
            .await
            .unwrap();

        let backup = outcome.backup_path.unwrap();
        assert!(backup.to_string_lossy().contains("data.json.backup."));
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "{}");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"a\": 1}\n");
        assert!(host.tabs().is_empty());
    }

    #[tokio::test]
    async fn test_warnings_do_not_block() {
        let temp = TempDir::new().unwrap();
        let host = Arc::new(HeadlessHost::new());
        let saver = DirectSaver::new(host.clone(), Arc::new(LocalFileSystem::new()), temp.path());
        let mut diagnostics = DiagnosticsSnapshotter::new(host.clone(), SessionContext::detached());

        let outcome = saver
            .save_directly("empty.txt", "", &mut diagnostics, quiet(false, true))
            .await
            .unwrap();
        assert_eq!(outcome.warnings, vec![ContentWarning::Empty]);
        assert_eq!(outcome.backup_path, None);
        assert!(temp.path().join("empty.txt").exists());
    }
}
