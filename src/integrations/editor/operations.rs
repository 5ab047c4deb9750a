use metrics::counter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{EditError, HostError};
use crate::fs::{FileSystem, paths_equal};
use crate::integrations::diagnostics::DiagnosticsSnapshotter;
use crate::integrations::editor::diff_view::DiffViewManager;
use crate::integrations::editor::session::{EditKind, SaveResult};
use crate::integrations::host::{EditorHost, ShowOptions, TextEditor, TextRange};
use crate::text::{detect_line_ending, normalize_eol, strip_all_boms};

/// Knobs for [`EditOperations::save_changes`], read from settings by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    pub diagnostics_enabled: bool,
    pub write_delay_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevertOptions {
    pub cleanup_directories: bool,
}

/// Outcome of a precondition check. Never an error: callers branch on `valid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Check that a save has an editor, a path and a document behind it.
pub fn validate_save_preconditions(
    editor: Option<&Arc<dyn TextEditor>>,
    rel_path: &str,
    host: &dyn EditorHost,
) -> ValidationResult {
    let Some(editor) = editor else {
        return ValidationResult::invalid("No active editor for the edit");
    };
    if editor.is_closed() {
        return ValidationResult::invalid(format!(
            "The diff editor for {} has been closed",
            rel_path
        ));
    }
    if rel_path.trim().is_empty() {
        return ValidationResult::invalid("No file path for the edit");
    }
    let has_document = host
        .text_documents()
        .iter()
        .any(|document| paths_equal(&document.path, editor.path()));
    if !has_document {
        return ValidationResult::invalid(format!("No open document for {}", rel_path));
    }
    ValidationResult::ok()
}

/// Strip BOMs and bring both texts to the line ending of `proposed`.
/// Returns `(edited, proposed)`.
pub fn normalize_for_comparison(edited: &str, proposed: &str) -> (String, String) {
    let edited = strip_all_boms(edited);
    let proposed = strip_all_boms(proposed);
    let eol = detect_line_ending(&proposed);
    (normalize_eol(&edited, eol), normalize_eol(&proposed, eol))
}

fn editor_error(path: &Path, error: HostError) -> EditError {
    match error {
        HostError::EditorDisposed => EditError::EditorClosed {
            path: path.to_path_buf(),
        },
        other => other.into(),
    }
}

/// Commits or rolls back the edit shown in the comparison view.
pub struct EditOperations {
    host: Arc<dyn EditorHost>,
    fs: Arc<dyn FileSystem>,
    diff_view: Arc<DiffViewManager>,
    cwd: PathBuf,
}

impl EditOperations {
    pub fn new(
        host: Arc<dyn EditorHost>,
        fs: Arc<dyn FileSystem>,
        diff_view: Arc<DiffViewManager>,
        cwd: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host,
            fs,
            diff_view,
            cwd: cwd.into(),
        }
    }

    /// Write the editor's text to disk and report what happened.
    ///
    /// The live editor text wins over `proposed_content`; any difference after
    /// normalization is surfaced verbatim as `user_edits`.
    pub async fn save_changes(
        &self,
        editor: &Arc<dyn TextEditor>,
        abs_path: &Path,
        proposed_content: &str,
        diagnostics: &mut DiagnosticsSnapshotter,
        options: SaveOptions,
    ) -> Result<SaveResult, EditError> {
        let edited_content = editor.text().map_err(|e| editor_error(abs_path, e))?;
        if editor.is_dirty().map_err(|e| editor_error(abs_path, e))? {
            editor.save().await.map_err(|e| editor_error(abs_path, e))?;
        }

        let show = ShowOptions {
            preview: false,
            preserve_focus: true,
        };
        if let Err(e) = self.host.show_text_document(abs_path, show).await {
            warn!("Could not show {} after saving: {}", abs_path.display(), e);
        }
        self.diff_view.close_all_diff_views().await;

        let new_problems = if options.diagnostics_enabled {
            diagnostics
                .process_new_diagnostics(options.write_delay_ms, &self.cwd)
                .await
        } else {
            String::new()
        };

        let (normalized_edited, normalized_proposed) =
            normalize_for_comparison(&edited_content, proposed_content);
        let user_edits = (normalized_edited != normalized_proposed).then_some(edited_content);

        self.fs.write_file(abs_path, &normalized_edited).await?;

        counter!("redline.diff.saved", 1);
        if user_edits.is_some() {
            counter!("redline.diff.user_edits", 1);
            info!("Saved {} with user edits", abs_path.display());
        } else {
            info!("Saved {}", abs_path.display());
        }

        Ok(SaveResult {
            new_problems_message: (!new_problems.is_empty()).then_some(new_problems),
            user_edits,
            final_content: Some(normalized_edited),
        })
    }

    /// Undo the edit: delete a created file or restore the original content.
    pub async fn revert_changes(
        &self,
        editor: Option<&Arc<dyn TextEditor>>,
        abs_path: &Path,
        original_content: &str,
        edit_kind: EditKind,
        created_directories: &[PathBuf],
        options: RevertOptions,
    ) -> Result<(), EditError> {
        match edit_kind {
            EditKind::Create => {
                if let Some(editor) = editor.filter(|editor| !editor.is_closed()) {
                    if editor.is_dirty().unwrap_or(false) {
                        if let Err(e) = editor.save().await {
                            debug!("Discarded document could not be saved: {}", e);
                        }
                    }
                }
                self.diff_view.close_all_diff_views().await;

                if self.fs.file_exists(abs_path).await {
                    self.fs.delete_file(abs_path).await?;
                }
                if options.cleanup_directories && !created_directories.is_empty() {
                    self.fs.remove_directories(created_directories).await;
                }
                info!("Reverted creation of {}", abs_path.display());
            }
            EditKind::Modify => {
                let original = strip_all_boms(original_content);
                self.host
                    .apply_edit(abs_path, TextRange::everything(), &original)
                    .await?;
                self.host.save_document(abs_path).await?;
                self.diff_view.close_all_diff_views().await;

                let show = ShowOptions {
                    preview: false,
                    preserve_focus: true,
                };
                if let Err(e) = self.host.show_text_document(abs_path, show).await {
                    warn!("Could not show {} after reverting: {}", abs_path.display(), e);
                }
                info!("Reverted changes to {}", abs_path.display());
            }
        }

        counter!("redline.diff.reverted", 1);
        Ok(())
    }
}
