use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::integrations::host::TextEditor;

/// Whether the target file existed before the edit started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditKind {
    Create,
    Modify,
}

impl EditKind {
    pub fn past_tense(&self) -> &'static str {
        match self {
            EditKind::Create => "created",
            EditKind::Modify => "modified",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Idle,
    Editing,
    Saved,
    Reverted,
}

/// Everything known about the one file being edited.
pub struct EditSession {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub edit_kind: EditKind,
    /// File content at open time, "" for new files.
    pub original_content: String,
    /// Most recent content passed to an update.
    pub streamed_content: Option<String>,
    /// Directories created for a new file, outermost first.
    pub created_directories: Vec<PathBuf>,
    pub active_editor: Option<Arc<dyn TextEditor>>,
}

impl EditSession {
    pub fn new(relative_path: impl Into<String>, absolute_path: PathBuf, edit_kind: EditKind) -> Self {
        Self {
            relative_path: relative_path.into(),
            absolute_path,
            edit_kind,
            original_content: String::new(),
            streamed_content: None,
            created_directories: Vec::new(),
            active_editor: None,
        }
    }

    /// The active editor, unless the user has closed it.
    pub fn live_editor(&self) -> Option<&Arc<dyn TextEditor>> {
        self.active_editor.as_ref().filter(|editor| !editor.is_closed())
    }
}

impl fmt::Debug for EditSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditSession")
            .field("relative_path", &self.relative_path)
            .field("absolute_path", &self.absolute_path)
            .field("edit_kind", &self.edit_kind)
            .field("original_len", &self.original_content.len())
            .field("created_directories", &self.created_directories)
            .field("has_editor", &self.active_editor.is_some())
            .finish()
    }
}

/// Outcome of a committed edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResult {
    /// Banner plus formatted problems, present only when the write introduced errors.
    pub new_problems_message: Option<String>,
    /// Raw editor text, present only when it differed from the proposal after normalization.
    pub user_edits: Option<String>,
    /// Exactly what was written to disk.
    pub final_content: Option<String>,
}

impl SaveResult {
    pub fn has_user_edits(&self) -> bool {
        self.user_edits.is_some()
    }
}
