use metrics::counter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::context::SessionContext;
use crate::error::EditError;
use crate::fs::{FileSystem, paths_equal, resolve_absolute_path};
use crate::integrations::diagnostics::DiagnosticsSnapshotter;
use crate::integrations::editor::decoration_controller::DecorationFactory;
use crate::integrations::editor::diff_view::{DiffViewManager, should_scroll_editor};
use crate::integrations::editor::direct_save::{DirectSaveOptions, DirectSaveOutcome, DirectSaver};
use crate::integrations::editor::effects::{DecoratedEffects, EditorEffects};
use crate::integrations::editor::operations::{
    EditOperations, RevertOptions, SaveOptions, ValidationResult, validate_save_preconditions,
};
use crate::integrations::editor::session::{EditKind, EditSession, ProviderState, SaveResult};
use crate::integrations::editor::streaming::{StreamProgress, StreamingApplier, finalize_content};
use crate::integrations::editor::write_result::{ToolWriteResult, push_tool_write_result};
use crate::integrations::host::{EditorHost, TextEditor};

/// The last write that reached disk, kept for [`DiffViewProvider::push_tool_write_result`].
#[derive(Debug, Clone)]
struct CompletedWrite {
    relative_path: String,
    edit_kind: EditKind,
    proposed_content: String,
    result: SaveResult,
}

/// Drives one file edit at a time through `open → update* → save | revert → reset`.
pub struct DiffViewProvider {
    host: Arc<dyn EditorHost>,
    fs: Arc<dyn FileSystem>,
    cwd: PathBuf,
    context: SessionContext,
    diff_view: Arc<DiffViewManager>,
    diagnostics: DiagnosticsSnapshotter,
    streaming: StreamingApplier,
    operations: EditOperations,
    direct: DirectSaver,
    decorations: Arc<DecorationFactory>,
    effects: Box<dyn EditorEffects>,
    state: ProviderState,
    session: Option<EditSession>,
    last_write: Option<CompletedWrite>,
}

impl DiffViewProvider {
    pub fn new(
        host: Arc<dyn EditorHost>,
        fs: Arc<dyn FileSystem>,
        cwd: impl Into<PathBuf>,
        context: SessionContext,
    ) -> Self {
        let cwd = cwd.into();
        let diff_view = Arc::new(DiffViewManager::new(host.clone()));
        let decorations = Arc::new(DecorationFactory::new(host.clone()));
        Self {
            diagnostics: DiagnosticsSnapshotter::new(host.clone(), context.clone()),
            streaming: StreamingApplier::new(),
            operations: EditOperations::new(host.clone(), fs.clone(), diff_view.clone(), cwd.clone()),
            direct: DirectSaver::new(host.clone(), fs.clone(), cwd.clone()),
            effects: Box::new(DecoratedEffects::new(decorations.clone())),
            decorations,
            diff_view,
            host,
            fs,
            cwd,
            context,
            state: ProviderState::Idle,
            session: None,
            last_write: None,
        }
    }

    /// Swap the cosmetic strategy. The edit itself behaves identically under any of them.
    pub fn with_effects(mut self, effects: Box<dyn EditorEffects>) -> Self {
        self.effects = effects;
        self
    }

    pub fn state(&self) -> ProviderState {
        self.state
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        self.state == ProviderState::Editing
    }

    pub fn diff_view(&self) -> &DiffViewManager {
        &self.diff_view
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn last_result(&self) -> Option<&SaveResult> {
        self.last_write.as_ref().map(|write| &write.result)
    }

    /// Start an edit of `rel_path` and show it in a comparison view.
    ///
    /// The session is recorded before anything on disk changes, so a failure
    /// part way through can still be cleaned up with [`revert_changes`](Self::revert_changes).
    pub async fn open(&mut self, rel_path: &str) -> Result<Arc<dyn TextEditor>, EditError> {
        if self.is_editing() {
            let current = self
                .session
                .as_ref()
                .map(|session| session.relative_path.clone())
                .unwrap_or_default();
            return Err(EditError::InvalidState(format!(
                "an edit of {} is already in progress",
                current
            )));
        }
        if rel_path.trim().is_empty() {
            return Err(EditError::Validation("file path is empty".to_string()));
        }
        self.reset();

        let abs_path = resolve_absolute_path(&self.cwd, rel_path);
        let exists = self.fs.file_exists(&abs_path).await;
        let edit_kind = if exists { EditKind::Modify } else { EditKind::Create };
        debug!("Opening {} for {:?}", abs_path.display(), edit_kind);

        self.session = Some(EditSession::new(rel_path, abs_path.clone(), edit_kind));
        self.state = ProviderState::Editing;
        self.last_write = None;

        self.diagnostics.capture_diagnostics();

        let original_content = if exists {
            let dirty = self
                .host
                .text_documents()
                .iter()
                .any(|document| document.is_dirty && paths_equal(&document.path, &abs_path));
            if dirty {
                self.host.save_document(&abs_path).await?;
            }
            self.fs.read_file(&abs_path).await?
        } else {
            let created = self.fs.create_directories_for_file(&abs_path).await?;
            if let Some(session) = self.session.as_mut() {
                session.created_directories = created;
            }
            self.fs.write_file(&abs_path, "").await?;
            String::new()
        };
        if let Some(session) = self.session.as_mut() {
            session.original_content = original_content.clone();
        }

        self.diff_view.close_text_tabs(&abs_path).await;
        let editor = self
            .diff_view
            .open_diff_editor(&abs_path, &original_content, edit_kind)
            .await?;

        if let Some(session) = self.session.as_mut() {
            session.active_editor = Some(editor.clone());
        }
        self.effects.begin(&editor);
        self.streaming.reset();

        counter!("redline.diff.opened", 1);
        info!("Editing {} ({:?})", rel_path, edit_kind);
        Ok(editor)
    }

    /// Apply the content accumulated so far. Exactly one call must pass `is_final`.
    pub async fn update(&mut self, content: &str, is_final: bool) -> Result<StreamProgress, EditError> {
        if !self.is_editing() {
            return Err(EditError::InvalidState(format!(
                "update received while {:?}",
                self.state
            )));
        }
        // Recorded before anything can fail so a later save or revert sees it
        if let Some(session) = self.session.as_mut() {
            session.streamed_content = Some(content.to_string());
        }

        let Some(session) = self.session.as_ref() else {
            return Err(EditError::InvalidState("no edit session".to_string()));
        };
        let Some(editor) = session.active_editor.clone() else {
            return Err(EditError::InvalidState(format!(
                "no diff editor is open for {}",
                session.relative_path
            )));
        };
        if editor.is_closed() {
            return Err(EditError::EditorClosed {
                path: session.absolute_path.clone(),
            });
        }
        if !self.effects.is_ready() {
            return Err(EditError::InvalidState(
                "decorations were not initialized for the diff editor".to_string(),
            ));
        }

        let progress = self
            .streaming
            .update_streaming_content(
                &editor,
                content,
                is_final,
                &session.original_content,
                self.effects.as_mut(),
            )
            .await?;

        if is_final {
            self.effects
                .scroll_to_first_diff(editor.as_ref(), &session.original_content);
        } else if should_scroll_editor(&editor.visible_ranges(), progress.end_line) {
            self.effects.scroll_to_line(editor.as_ref(), progress.end_line);
        }
        Ok(progress)
    }

    pub fn validate_save(&self) -> ValidationResult {
        let Some(session) = self.session.as_ref() else {
            return ValidationResult::invalid("No edit in progress");
        };
        validate_save_preconditions(
            session.active_editor.as_ref(),
            &session.relative_path,
            self.host.as_ref(),
        )
    }

    /// Commit the editor's content to disk.
    pub async fn save_changes(&mut self) -> Result<SaveResult, EditError> {
        if !self.is_editing() {
            return Err(EditError::InvalidState(format!(
                "save requested while {:?}",
                self.state
            )));
        }
        let validation = self.validate_save();
        if !validation.valid {
            return Err(EditError::Validation(validation.error.unwrap_or_default()));
        }
        let Some(session) = self.session.as_ref() else {
            return Err(EditError::InvalidState("no edit session".to_string()));
        };
        let Some(editor) = session.active_editor.clone() else {
            return Err(EditError::InvalidState("no diff editor".to_string()));
        };
        // Compare against what the view was finalized with, not the raw stream
        let proposed = finalize_content(
            session.streamed_content.as_deref().unwrap_or_default(),
            &session.original_content,
        );

        let settings = self.context.settings();
        let result = self
            .operations
            .save_changes(
                &editor,
                &session.absolute_path,
                &proposed,
                &mut self.diagnostics,
                SaveOptions {
                    diagnostics_enabled: settings.diagnostics_enabled,
                    write_delay_ms: settings.write_delay_ms,
                },
            )
            .await?;

        self.last_write = Some(CompletedWrite {
            relative_path: session.relative_path.clone(),
            edit_kind: session.edit_kind,
            proposed_content: proposed,
            result: result.clone(),
        });
        self.effects.end();
        self.state = ProviderState::Saved;
        Ok(result)
    }

    /// Throw the edit away, deleting a created file or restoring the original.
    pub async fn revert_changes(&mut self) -> Result<(), EditError> {
        if !self.is_editing() {
            return Err(EditError::InvalidState(format!(
                "revert requested while {:?}",
                self.state
            )));
        }
        let Some(session) = self.session.as_ref() else {
            return Err(EditError::InvalidState("no edit session".to_string()));
        };

        let settings = self.context.settings();
        self.operations
            .revert_changes(
                session.live_editor(),
                &session.absolute_path,
                &session.original_content,
                session.edit_kind,
                &session.created_directories,
                RevertOptions {
                    cleanup_directories: settings.cleanup_created_directories,
                },
            )
            .await?;

        self.effects.end();
        self.state = ProviderState::Reverted;
        Ok(())
    }

    /// Forget the current session. Safe to call any number of times.
    pub fn reset(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("Resetting edit session for {}", session.relative_path);
        }
        self.streaming.reset();
        self.effects.end();
        self.diagnostics.clear();
        self.state = ProviderState::Idle;
    }

    /// Write `content` straight to disk, skipping the comparison view.
    pub async fn save_directly(
        &mut self,
        rel_path: &str,
        content: &str,
        open_file: bool,
    ) -> Result<DirectSaveOutcome, EditError> {
        if self.is_editing() {
            return Err(EditError::InvalidState(
                "cannot save directly while a diff edit is in progress".to_string(),
            ));
        }
        let settings = self.context.settings();
        let options = DirectSaveOptions {
            open_file,
            diagnostics_enabled: settings.diagnostics_enabled,
            write_delay_ms: settings.write_delay_ms,
            create_backup: settings.create_backups,
        };
        let outcome = self
            .direct
            .save_directly(rel_path, content, &mut self.diagnostics, options)
            .await?;

        self.last_write = Some(CompletedWrite {
            relative_path: rel_path.to_string(),
            edit_kind: outcome.edit_kind,
            proposed_content: content.to_string(),
            result: outcome.result.clone(),
        });
        self.state = ProviderState::Saved;
        Ok(outcome)
    }

    /// Structured notice describing the last write.
    pub fn push_tool_write_result(&self) -> Result<ToolWriteResult, EditError> {
        let Some(write) = self.last_write.as_ref() else {
            return Err(EditError::InvalidState("nothing has been written yet".to_string()));
        };
        Ok(push_tool_write_result(
            &write.relative_path,
            write.edit_kind,
            &write.proposed_content,
            &write.result,
        ))
    }

    /// Release host resources held for this activation.
    pub fn dispose(&mut self) {
        self.reset();
        self.last_write = None;
        self.decorations.dispose();
    }
}
