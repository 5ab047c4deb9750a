//! The slice of the host editor the edit engine talks to.
//!
//! Everything here is an interface: the engine never assumes a particular
//! editor, only that it can open documents, show a side-by-side comparison,
//! apply edits, enumerate tabs, draw decorations and report diagnostics.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::HostError;

/// Zero-based line/character position inside a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    pub fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Whole lines `start_line..end_line`, end exclusive.
    pub fn lines(start_line: usize, end_line: usize) -> Self {
        Self::new(Position::new(start_line, 0), Position::new(end_line, 0))
    }

    /// Everything from the start of `start_line` through the end of `end_line`.
    pub fn whole_lines(start_line: usize, end_line: usize) -> Self {
        Self::new(Position::new(start_line, 0), Position::new(end_line, usize::MAX))
    }

    /// A range covering the entire document, whatever its length.
    pub fn everything() -> Self {
        Self::new(Position::default(), Position::new(usize::MAX, usize::MAX))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevealType {
    Default,
    InCenter,
    AtTop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowOptions {
    pub preview: bool,
    pub preserve_focus: bool,
}

impl Default for ShowOptions {
    fn default() -> Self {
        Self {
            preview: false,
            preserve_focus: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Information,
    Hint,
}

impl DiagnosticSeverity {
    pub fn label(&self) -> &'static str {
        match self {
            DiagnosticSeverity::Error => "Error",
            DiagnosticSeverity::Warning => "Warning",
            DiagnosticSeverity::Information => "Information",
            DiagnosticSeverity::Hint => "Hint",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub range: TextRange,
    pub message: String,
    pub severity: DiagnosticSeverity,
    pub source: Option<String>,
    pub code: Option<String>,
}

impl Diagnostic {
    pub fn new(range: TextRange, message: impl Into<String>, severity: DiagnosticSeverity) -> Self {
        Self {
            range,
            message: message.into(),
            severity,
            source: None,
            code: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Editor-wide diagnostics, one entry per file, in host order.
pub type DiagnosticSnapshot = Vec<(PathBuf, Vec<Diagnostic>)>;

/// Visual options for a decoration type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecorationStyle {
    pub background_color: Option<String>,
    pub border_color: Option<String>,
    pub border_style: Option<String>,
    pub border_width: Option<String>,
    pub opacity: Option<String>,
    pub is_whole_line: bool,
}

/// Host handle for a registered decoration type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecorationKey(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabInput {
    Text { path: PathBuf },
    Diff { original: String, modified: PathBuf },
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: Uuid,
    pub label: String,
    pub input: TabInput,
    pub is_dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub path: PathBuf,
    pub is_dirty: bool,
}

/// A visible editor on a single document.
#[async_trait]
pub trait TextEditor: Send + Sync {
    fn id(&self) -> Uuid;

    /// Path of the document shown in this editor.
    fn path(&self) -> &Path;

    /// True once the user or the host has closed this editor.
    fn is_closed(&self) -> bool;

    fn text(&self) -> Result<String, HostError>;

    fn line_count(&self) -> Result<usize, HostError>;

    fn is_dirty(&self) -> Result<bool, HostError>;

    /// Replace `range` with `text`. Out-of-bounds positions clamp to the document end.
    async fn replace(&self, range: TextRange, text: &str) -> Result<(), HostError>;

    async fn save(&self) -> Result<(), HostError>;

    fn set_cursor(&self, position: Position) -> Result<(), HostError>;

    fn reveal_range(&self, range: TextRange, reveal: RevealType) -> Result<(), HostError>;

    fn visible_ranges(&self) -> Vec<TextRange>;

    fn set_decorations(&self, key: &DecorationKey, ranges: &[TextRange]) -> Result<(), HostError>;
}

/// Window, workspace and language services of the host editor.
#[async_trait]
pub trait EditorHost: Send + Sync {
    /// Load a document without showing it.
    async fn open_text_document(&self, path: &Path) -> Result<(), HostError>;

    async fn show_text_document(
        &self,
        path: &Path,
        options: ShowOptions,
    ) -> Result<Arc<dyn TextEditor>, HostError>;

    /// Open a comparison view with `original_uri` on the left and the real file on the right.
    /// Returns once the command is issued; the editor arrives through the events below.
    async fn open_diff(
        &self,
        original_uri: &str,
        modified: &Path,
        title: &str,
        options: ShowOptions,
    ) -> Result<(), HostError>;

    fn active_editor(&self) -> Option<Arc<dyn TextEditor>>;

    fn visible_editors(&self) -> Vec<Arc<dyn TextEditor>>;

    fn tabs(&self) -> Vec<TabInfo>;

    async fn close_tab(&self, id: Uuid) -> Result<(), HostError>;

    fn text_documents(&self) -> Vec<DocumentInfo>;

    /// Document-level edit, independent of any editor being open.
    async fn apply_edit(&self, path: &Path, range: TextRange, text: &str) -> Result<(), HostError>;

    async fn save_document(&self, path: &Path) -> Result<(), HostError>;

    fn create_decoration_type(&self, style: &DecorationStyle) -> DecorationKey;

    fn dispose_decoration_type(&self, key: &DecorationKey);

    fn diagnostics(&self) -> DiagnosticSnapshot;

    /// Fires with the path of every newly opened document. Drop the receiver to unsubscribe.
    fn on_did_open_text_document(&self) -> broadcast::Receiver<PathBuf>;

    /// Fires with the full set of visible editors whenever it changes.
    fn on_did_change_visible_editors(&self) -> broadcast::Receiver<Vec<Arc<dyn TextEditor>>>;
}
