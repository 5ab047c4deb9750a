//! In-process editor host backed by the real filesystem.
//!
//! Documents live in memory once opened and are written back on save. There is
//! no rendering: visible ranges, decorations and reveals are recorded so callers
//! can inspect them.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::HostError;
use crate::fs::normalize_path;
use crate::integrations::editor::diff_view::decode_diff_source;
use crate::integrations::host::{
    DecorationKey, DecorationStyle, DiagnosticSnapshot, DocumentInfo, EditorHost, Position,
    RevealType, ShowOptions, TabInfo, TabInput, TextEditor, TextRange,
};

const EVENT_CAPACITY: usize = 64;
const VIEWPORT_LINES: usize = 40;

/// How the host reacts to a request for a comparison view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiffOpenBehavior {
    /// Open the view and announce the editor right away.
    #[default]
    Immediate,
    /// Accept the command but never show anything.
    Never,
}

/// Byte offset of `position` in `text`, clamped to the document.
fn offset_at(text: &str, position: Position) -> usize {
    let mut line_start = 0;
    for _ in 0..position.line {
        match text[line_start..].find('\n') {
            Some(idx) => line_start += idx + 1,
            None => return text.len(),
        }
    }
    let line_end = text[line_start..]
        .find('\n')
        .map(|idx| line_start + idx)
        .unwrap_or(text.len());
    let line = &text[line_start..line_end];
    let line = line.strip_suffix('\r').unwrap_or(line);
    line.char_indices()
        .nth(position.character)
        .map(|(idx, _)| line_start + idx)
        .unwrap_or(line_start + line.len())
}

struct HeadlessDocument {
    path: PathBuf,
    text: RwLock<String>,
    dirty: AtomicBool,
}

impl HeadlessDocument {
    fn new(path: PathBuf, text: String) -> Self {
        Self {
            path,
            text: RwLock::new(text),
            dirty: AtomicBool::new(false),
        }
    }

    fn text(&self) -> String {
        self.text.read().clone()
    }

    fn line_count(&self) -> usize {
        self.text.read().split('\n').count()
    }

    fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn replace(&self, range: TextRange, new_text: &str) {
        let mut text = self.text.write();
        let start = offset_at(&text, range.start);
        let end = offset_at(&text, range.end).max(start);
        text.replace_range(start..end, new_text);
        self.dirty.store(true, Ordering::SeqCst);
    }

    async fn save(&self) -> Result<(), HostError> {
        let text = self.text();
        tokio::fs::write(&self.path, text).await.map_err(|e| {
            HostError::CommandFailed(format!("save {}: {}", self.path.display(), e))
        })?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Editor handle handed out by [`HeadlessHost`].
pub struct HeadlessEditor {
    id: Uuid,
    document: Arc<HeadlessDocument>,
    closed: AtomicBool,
    cursor: Mutex<Position>,
    visible: Mutex<TextRange>,
    revealed: Mutex<Vec<(TextRange, RevealType)>>,
    decorations: Mutex<HashMap<DecorationKey, Vec<TextRange>>>,
}

impl HeadlessEditor {
    fn new(document: Arc<HeadlessDocument>) -> Self {
        Self {
            id: Uuid::new_v4(),
            document,
            closed: AtomicBool::new(false),
            cursor: Mutex::new(Position::default()),
            visible: Mutex::new(TextRange::lines(0, VIEWPORT_LINES - 1)),
            revealed: Mutex::new(Vec::new()),
            decorations: Mutex::new(HashMap::new()),
        }
    }

    fn ensure_open(&self) -> Result<(), HostError> {
        if self.is_closed() {
            return Err(HostError::EditorDisposed);
        }
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn cursor(&self) -> Position {
        *self.cursor.lock()
    }

    /// Every reveal request so far, oldest first.
    pub fn revealed(&self) -> Vec<(TextRange, RevealType)> {
        self.revealed.lock().clone()
    }

    pub fn decorations(&self, key: &DecorationKey) -> Vec<TextRange> {
        self.decorations.lock().get(key).cloned().unwrap_or_default()
    }

    /// Move the viewport as if the user had scrolled.
    pub fn scroll_viewport_to(&self, first_line: usize) {
        *self.visible.lock() = TextRange::lines(first_line, first_line + VIEWPORT_LINES - 1);
    }
}

#[async_trait]
impl TextEditor for HeadlessEditor {
    fn id(&self) -> Uuid {
        self.id
    }

    fn path(&self) -> &Path {
        &self.document.path
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn text(&self) -> Result<String, HostError> {
        Ok(self.document.text())
    }

    fn line_count(&self) -> Result<usize, HostError> {
        Ok(self.document.line_count())
    }

    fn is_dirty(&self) -> Result<bool, HostError> {
        Ok(self.document.is_dirty())
    }

    async fn replace(&self, range: TextRange, text: &str) -> Result<(), HostError> {
        self.ensure_open()?;
        self.document.replace(range, text);
        Ok(())
    }

    async fn save(&self) -> Result<(), HostError> {
        self.document.save().await
    }

    fn set_cursor(&self, position: Position) -> Result<(), HostError> {
        self.ensure_open()?;
        *self.cursor.lock() = position;
        Ok(())
    }

    fn reveal_range(&self, range: TextRange, reveal: RevealType) -> Result<(), HostError> {
        self.ensure_open()?;
        let line = range.start.line;
        let mut visible = self.visible.lock();
        let first_line = match reveal {
            RevealType::AtTop => Some(line),
            RevealType::InCenter => Some(line.saturating_sub(VIEWPORT_LINES / 2)),
            RevealType::Default if line < visible.start.line || line > visible.end.line => {
                Some(line.saturating_sub(VIEWPORT_LINES / 2))
            }
            RevealType::Default => None,
        };
        if let Some(first_line) = first_line {
            *visible = TextRange::lines(first_line, first_line + VIEWPORT_LINES - 1);
        }
        self.revealed.lock().push((range, reveal));
        Ok(())
    }

    fn visible_ranges(&self) -> Vec<TextRange> {
        if self.is_closed() {
            return Vec::new();
        }
        vec![*self.visible.lock()]
    }

    fn set_decorations(&self, key: &DecorationKey, ranges: &[TextRange]) -> Result<(), HostError> {
        self.ensure_open()?;
        self.decorations.lock().insert(key.clone(), ranges.to_vec());
        Ok(())
    }
}

struct HeadlessTab {
    id: Uuid,
    label: String,
    input: TabInput,
    editor: Arc<HeadlessEditor>,
}

/// Editor host that keeps documents, tabs and editors in memory.
pub struct HeadlessHost {
    documents: DashMap<PathBuf, Arc<HeadlessDocument>>,
    editors: Mutex<Vec<Arc<HeadlessEditor>>>,
    tabs: Mutex<Vec<HeadlessTab>>,
    active: Mutex<Option<Arc<HeadlessEditor>>>,
    diagnostics: Mutex<DiagnosticSnapshot>,
    decoration_types: Mutex<HashMap<DecorationKey, DecorationStyle>>,
    diff_behavior: Mutex<DiffOpenBehavior>,
    opened_tx: broadcast::Sender<PathBuf>,
    visible_tx: broadcast::Sender<Vec<Arc<dyn TextEditor>>>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        let (opened_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (visible_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            documents: DashMap::new(),
            editors: Mutex::new(Vec::new()),
            tabs: Mutex::new(Vec::new()),
            active: Mutex::new(None),
            diagnostics: Mutex::new(Vec::new()),
            decoration_types: Mutex::new(HashMap::new()),
            diff_behavior: Mutex::new(DiffOpenBehavior::default()),
            opened_tx,
            visible_tx,
        }
    }

    pub fn with_diff_behavior(self, behavior: DiffOpenBehavior) -> Self {
        *self.diff_behavior.lock() = behavior;
        self
    }

    pub fn set_diff_behavior(&self, behavior: DiffOpenBehavior) {
        *self.diff_behavior.lock() = behavior;
    }

    /// Number of live event subscriptions across both event sources.
    pub fn listener_count(&self) -> usize {
        self.opened_tx.receiver_count() + self.visible_tx.receiver_count()
    }

    pub fn set_diagnostics(&self, snapshot: DiagnosticSnapshot) {
        *self.diagnostics.lock() = snapshot;
    }

    pub fn live_decoration_types(&self) -> usize {
        self.decoration_types.lock().len()
    }

    pub fn document_text(&self, path: &Path) -> Option<String> {
        self.documents
            .get(&normalize_path(path))
            .map(|document| document.text())
    }

    /// The most recently shown editor for `path`, if still visible.
    pub fn editor_for(&self, path: &Path) -> Option<Arc<HeadlessEditor>> {
        let path = normalize_path(path);
        self.editors
            .lock()
            .iter()
            .rev()
            .find(|editor| editor.document.path == path)
            .cloned()
    }

    /// Content served on the left side of the comparison view for `path`.
    pub fn diff_original(&self, path: &Path) -> Option<String> {
        let path = normalize_path(path);
        self.tabs.lock().iter().find_map(|tab| match &tab.input {
            TabInput::Diff { original, modified } if *modified == path => {
                decode_diff_source(original)
            }
            _ => None,
        })
    }

    /// Close every tab showing `path`, dirty or not, the way a user would.
    pub fn close_editor(&self, path: &Path) {
        let path = normalize_path(path);
        let ids: Vec<Uuid> = self
            .tabs
            .lock()
            .iter()
            .filter(|tab| tab.editor.document.path == path)
            .map(|tab| tab.id)
            .collect();
        for id in ids {
            self.remove_tab(id);
        }
        self.emit_visible();
    }

    async fn load_document(&self, path: &Path) -> Result<(Arc<HeadlessDocument>, bool), HostError> {
        let path = normalize_path(path);
        let existing = self.documents.get(&path).map(|document| document.clone());
        if let Some(document) = existing {
            // Clean documents follow the file on disk, like a real editor reloading them
            if !document.is_dirty() {
                if let Ok(text) = tokio::fs::read_to_string(&path).await {
                    *document.text.write() = text;
                }
            }
            return Ok((document, false));
        }

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(HostError::DocumentNotFound(path));
            }
            Err(e) => {
                return Err(HostError::CommandFailed(format!(
                    "open {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let mut newly_opened = false;
        let document = self
            .documents
            .entry(path.clone())
            .or_insert_with(|| {
                newly_opened = true;
                Arc::new(HeadlessDocument::new(path, text))
            })
            .clone();
        Ok((document, newly_opened))
    }

    fn add_editor(
        &self,
        document: Arc<HeadlessDocument>,
        label: String,
        input: TabInput,
    ) -> Arc<HeadlessEditor> {
        let editor = Arc::new(HeadlessEditor::new(document));
        self.editors.lock().push(editor.clone());
        self.tabs.lock().push(HeadlessTab {
            id: Uuid::new_v4(),
            label,
            input,
            editor: editor.clone(),
        });
        *self.active.lock() = Some(editor.clone());
        editor
    }

    fn remove_tab(&self, id: Uuid) -> bool {
        let removed = {
            let mut tabs = self.tabs.lock();
            let position = tabs.iter().position(|tab| tab.id == id);
            position.map(|idx| tabs.remove(idx))
        };
        let Some(tab) = removed else {
            return false;
        };

        tab.editor.close();
        let mut editors = self.editors.lock();
        editors.retain(|editor| editor.id != tab.editor.id);
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|editor| editor.id == tab.editor.id) {
            *active = editors.last().cloned();
        }
        true
    }

    fn emit_visible(&self) {
        let visible: Vec<Arc<dyn TextEditor>> = self
            .editors
            .lock()
            .iter()
            .map(|editor| editor.clone() as Arc<dyn TextEditor>)
            .collect();
        // No subscribers is fine
        let _ = self.visible_tx.send(visible);
    }

    fn emit_opened(&self, path: &Path) {
        let _ = self.opened_tx.send(path.to_path_buf());
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EditorHost for HeadlessHost {
    async fn open_text_document(&self, path: &Path) -> Result<(), HostError> {
        let (document, newly_opened) = self.load_document(path).await?;
        if newly_opened {
            self.emit_opened(&document.path);
        }
        Ok(())
    }

    async fn show_text_document(
        &self,
        path: &Path,
        options: ShowOptions,
    ) -> Result<Arc<dyn TextEditor>, HostError> {
        let normalized = normalize_path(path);
        let existing = self.tabs.lock().iter().rev().find_map(|tab| match &tab.input {
            TabInput::Text { path } if *path == normalized => Some(tab.editor.clone()),
            _ => None,
        });
        if let Some(editor) = existing {
            if !options.preserve_focus {
                *self.active.lock() = Some(editor.clone());
            }
            return Ok(editor);
        }

        let (document, newly_opened) = self.load_document(&normalized).await?;
        let label = normalized
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let editor = self.add_editor(document, label, TabInput::Text { path: normalized.clone() });
        trace!(
            "Showing {} (preview: {})",
            normalized.display(),
            options.preview
        );
        if newly_opened {
            self.emit_opened(&normalized);
        }
        self.emit_visible();
        Ok(editor)
    }

    async fn open_diff(
        &self,
        original_uri: &str,
        modified: &Path,
        title: &str,
        _options: ShowOptions,
    ) -> Result<(), HostError> {
        let behavior = *self.diff_behavior.lock();
        if behavior == DiffOpenBehavior::Never {
            debug!("Diff view for {} suppressed", modified.display());
            return Ok(());
        }

        let (document, newly_opened) = self.load_document(modified).await?;
        let path = document.path.clone();
        self.add_editor(
            document,
            title.to_string(),
            TabInput::Diff {
                original: original_uri.to_string(),
                modified: path.clone(),
            },
        );
        if newly_opened {
            self.emit_opened(&path);
        }
        self.emit_visible();
        Ok(())
    }

    fn active_editor(&self) -> Option<Arc<dyn TextEditor>> {
        self.active
            .lock()
            .clone()
            .map(|editor| editor as Arc<dyn TextEditor>)
    }

    fn visible_editors(&self) -> Vec<Arc<dyn TextEditor>> {
        self.editors
            .lock()
            .iter()
            .map(|editor| editor.clone() as Arc<dyn TextEditor>)
            .collect()
    }

    fn tabs(&self) -> Vec<TabInfo> {
        self.tabs
            .lock()
            .iter()
            .map(|tab| TabInfo {
                id: tab.id,
                label: tab.label.clone(),
                input: tab.input.clone(),
                is_dirty: tab.editor.document.is_dirty(),
            })
            .collect()
    }

    async fn close_tab(&self, id: Uuid) -> Result<(), HostError> {
        if !self.remove_tab(id) {
            return Err(HostError::CommandFailed(format!("no tab with id {}", id)));
        }
        self.emit_visible();
        Ok(())
    }

    fn text_documents(&self) -> Vec<DocumentInfo> {
        self.documents
            .iter()
            .map(|entry| DocumentInfo {
                path: entry.key().clone(),
                is_dirty: entry.value().is_dirty(),
            })
            .collect()
    }

    async fn apply_edit(&self, path: &Path, range: TextRange, text: &str) -> Result<(), HostError> {
        let (document, _) = self.load_document(path).await?;
        document.replace(range, text);
        Ok(())
    }

    async fn save_document(&self, path: &Path) -> Result<(), HostError> {
        let path = normalize_path(path);
        let document = self
            .documents
            .get(&path)
            .map(|document| document.clone())
            .ok_or_else(|| HostError::DocumentNotFound(path.clone()))?;
        document.save().await
    }

    fn create_decoration_type(&self, style: &DecorationStyle) -> DecorationKey {
        let key = DecorationKey(format!("decoration-{}", Uuid::new_v4()));
        self.decoration_types.lock().insert(key.clone(), style.clone());
        key
    }

    fn dispose_decoration_type(&self, key: &DecorationKey) {
        self.decoration_types.lock().remove(key);
    }

    fn diagnostics(&self) -> DiagnosticSnapshot {
        self.diagnostics.lock().clone()
    }

    fn on_did_open_text_document(&self) -> broadcast::Receiver<PathBuf> {
        self.opened_tx.subscribe()
    }

    fn on_did_change_visible_editors(&self) -> broadcast::Receiver<Vec<Arc<dyn TextEditor>>> {
        self.visible_tx.subscribe()
    }
}
