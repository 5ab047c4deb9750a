use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use parking_lot::Mutex;
use similar::{DiffOp, TextDiff};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::error::{EditError, HostError};
use crate::fs::{normalize_path, paths_equal};
use crate::integrations::editor::session::EditKind;
use crate::integrations::host::{
    EditorHost, Position, RevealType, ShowOptions, TabInput, TextEditor, TextRange,
};

/// URI scheme of the synthetic, read-only left side of every comparison view.
pub const DIFF_VIEW_URI_SCHEME: &str = "redline-diff";
/// Title fragment that marks a comparison tab as ours.
pub const DIFF_VIEW_LABEL_CHANGES: &str = "Original ↔ Proposed Changes";
pub const DIFF_EDITOR_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Lines of context kept below a revealed line.
const SCROLL_CONTEXT_LINES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffViewState {
    Closed,
    Opening,
    Open,
}

/// `redline-diff:<file name>?<base64 content>`
pub fn encode_diff_source(file_name: &str, content: &str) -> String {
    format!("{}:{}?{}", DIFF_VIEW_URI_SCHEME, file_name, BASE64.encode(content))
}

pub fn decode_diff_source(uri: &str) -> Option<String> {
    let rest = uri.strip_prefix(DIFF_VIEW_URI_SCHEME)?.strip_prefix(':')?;
    let (_, payload) = rest.rsplit_once('?')?;
    let bytes = BASE64.decode(payload).ok()?;
    String::from_utf8(bytes).ok()
}

fn is_own_diff_tab(label: &str, input: &TabInput) -> bool {
    match input {
        TabInput::Diff { original, .. } => {
            original.starts_with(&format!("{}:", DIFF_VIEW_URI_SCHEME))
                || label.contains(DIFF_VIEW_LABEL_CHANGES)
        }
        _ => false,
    }
}

fn diff_title(file_name: &str, kind: EditKind) -> String {
    match kind {
        EditKind::Modify => format!("{}: {} (Editable)", file_name, DIFF_VIEW_LABEL_CHANGES),
        EditKind::Create => format!("{}: New File (Editable)", file_name),
    }
}

/// Opens, finds and closes comparison views, one per file path.
pub struct DiffViewManager {
    host: Arc<dyn EditorHost>,
    states: Mutex<HashMap<PathBuf, DiffViewState>>,
}

impl DiffViewManager {
    pub fn new(host: Arc<dyn EditorHost>) -> Self {
        Self {
            host,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn state(&self, path: &Path) -> DiffViewState {
        self.states
            .lock()
            .get(&normalize_path(path))
            .copied()
            .unwrap_or(DiffViewState::Closed)
    }

    fn set_state(&self, path: &Path, state: DiffViewState) {
        self.states.lock().insert(normalize_path(path), state);
    }

    /// Show the original content next to the real file and return the editable right side.
    ///
    /// An already open comparison view for the same path is reused. Fails with
    /// [`EditError::Timeout`] if the editor hasn't appeared after
    /// [`DIFF_EDITOR_OPEN_TIMEOUT`]; event subscriptions are dropped on every exit path.
    pub async fn open_diff_editor(
        &self,
        abs_path: &Path,
        original_content: &str,
        kind: EditKind,
    ) -> Result<Arc<dyn TextEditor>, EditError> {
        if let Some(editor) = self.find_open_diff_editor(abs_path) {
            debug!("Reusing open diff view for {}", abs_path.display());
            self.set_state(abs_path, DiffViewState::Open);
            return Ok(editor);
        }

        self.set_state(abs_path, DiffViewState::Opening);
        match self.open_fresh(abs_path, original_content, kind).await {
            Ok(editor) => {
                self.set_state(abs_path, DiffViewState::Open);
                Ok(editor)
            }
            Err(e) => {
                self.set_state(abs_path, DiffViewState::Closed);
                Err(e)
            }
        }
    }

    fn find_open_diff_editor(&self, abs_path: &Path) -> Option<Arc<dyn TextEditor>> {
        let has_diff_tab = self.host.tabs().iter().any(|tab| match &tab.input {
            TabInput::Diff { original, modified } => {
                original.starts_with(&format!("{}:", DIFF_VIEW_URI_SCHEME))
                    && paths_equal(modified, abs_path)
            }
            _ => false,
        });
        if !has_diff_tab {
            return None;
        }
        self.host
            .visible_editors()
            .into_iter()
            .find(|editor| !editor.is_closed() && paths_equal(editor.path(), abs_path))
    }

    async fn open_fresh(
        &self,
        abs_path: &Path,
        original_content: &str,
        kind: EditKind,
    ) -> Result<Arc<dyn TextEditor>, EditError> {
        // Load the document first so the diff doesn't land in a preview tab that gets replaced
        self.host.open_text_document(abs_path).await?;

        let file_name = abs_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let original_uri = encode_diff_source(&file_name, original_content);
        let title = diff_title(&file_name, kind);

        let opened = self.host.on_did_open_text_document();
        let visible = self.host.on_did_change_visible_editors();

        self.host
            .open_diff(&original_uri, abs_path, &title, ShowOptions::default())
            .await?;

        let waiting = wait_for_editor(self.host.as_ref(), abs_path, opened, visible);
        match tokio::time::timeout(DIFF_EDITOR_OPEN_TIMEOUT, waiting).await {
            Ok(Some(editor)) => Ok(editor),
            Ok(None) => Err(HostError::CommandFailed(format!(
                "editor events stopped before the diff view for {} appeared",
                abs_path.display()
            ))
            .into()),
            Err(_) => Err(EditError::Timeout {
                path: abs_path.to_path_buf(),
                timeout: DIFF_EDITOR_OPEN_TIMEOUT,
            }),
        }
    }

    /// Close every comparison tab this engine opened, skipping dirty ones.
    pub async fn close_all_diff_views(&self) {
        let mut still_open: Vec<PathBuf> = Vec::new();
        for tab in self.host.tabs() {
            if !is_own_diff_tab(&tab.label, &tab.input) {
                continue;
            }
            let TabInput::Diff { modified, .. } = &tab.input else {
                continue;
            };
            if tab.is_dirty {
                still_open.push(modified.clone());
                continue;
            }
            if let Err(e) = self.host.close_tab(tab.id).await {
                warn!("Failed to close diff tab {}: {}", tab.label, e);
                still_open.push(modified.clone());
            }
        }

        for (path, state) in self.states.lock().iter_mut() {
            if !still_open.iter().any(|open| paths_equal(open, path)) {
                *state = DiffViewState::Closed;
            }
        }
    }

    /// Close plain, non-dirty tabs showing `abs_path` ahead of opening the comparison view.
    pub async fn close_text_tabs(&self, abs_path: &Path) {
        let tabs = self.host.tabs().into_iter().filter(|tab| {
            !tab.is_dirty
                && matches!(&tab.input, TabInput::Text { path } if paths_equal(path, abs_path))
        });
        for tab in tabs {
            if let Err(e) = self.host.close_tab(tab.id).await {
                warn!("Failed to close tab {}: {}", tab.label, e);
            }
        }
    }
}

async fn wait_for_editor(
    host: &dyn EditorHost,
    abs_path: &Path,
    mut opened: broadcast::Receiver<PathBuf>,
    mut visible: broadcast::Receiver<Vec<Arc<dyn TextEditor>>>,
) -> Option<Arc<dyn TextEditor>> {
    let matches = |editor: &Arc<dyn TextEditor>| paths_equal(editor.path(), abs_path);
    loop {
        tokio::select! {
            event = opened.recv() => match event {
                Ok(path) if paths_equal(&path, abs_path) => {
                    // Let the host settle its active editor
                    tokio::task::yield_now().await;
                    if let Some(editor) = host.active_editor().filter(matches) {
                        return Some(editor);
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return None,
            },
            event = visible.recv() => match event {
                Ok(editors) => {
                    let found = host
                        .active_editor()
                        .filter(matches)
                        .or_else(|| editors.into_iter().find(matches));
                    if let Some(editor) = found {
                        return Some(editor);
                    }
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return None,
            },
        }
    }
}

/// Reveal the first line where `original` and the editor's content diverge.
pub fn scroll_to_first_diff(editor: &dyn TextEditor, original: &str) {
    let current = match editor.text() {
        Ok(text) => text,
        Err(e) => {
            warn!("Cannot read {} to find first change: {}", editor.path().display(), e);
            return;
        }
    };

    let diff = TextDiff::from_lines(original, current.as_str());
    let first_change = diff.ops().iter().find_map(|op| match op {
        DiffOp::Equal { .. } => None,
        DiffOp::Insert { new_index, .. }
        | DiffOp::Delete { new_index, .. }
        | DiffOp::Replace { new_index, .. } => Some(*new_index),
    });

    if let Some(line) = first_change {
        let range = TextRange::new(Position::new(line, 0), Position::new(line, 0));
        if let Err(e) = editor.reveal_range(range, RevealType::InCenter) {
            warn!("Failed to reveal first change: {}", e);
        }
    }
}

/// Reveal `line` with a little context below it, centered.
pub fn scroll_editor_to_line(editor: &dyn TextEditor, line: usize) {
    let target = line + SCROLL_CONTEXT_LINES;
    let range = TextRange::new(Position::new(target, 0), Position::new(target, 0));
    if let Err(e) = editor.reveal_range(range, RevealType::InCenter) {
        debug!("Scroll skipped: {}", e);
    }
}

/// True when `end_line` is outside every visible range.
pub fn should_scroll_editor(visible_ranges: &[TextRange], end_line: usize) -> bool {
    !visible_ranges
        .iter()
        .any(|range| range.start.line <= end_line && end_line <= range.end.line)
}
