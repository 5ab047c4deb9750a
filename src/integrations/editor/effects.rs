//! Cosmetic side effects of streaming: overlays, active-line highlight and scrolling.
//!
//! None of these ever fail an edit. Hosts without decorations (or tests that
//! don't care) use [`NoEffects`].

use std::sync::Arc;

use crate::integrations::editor::decoration_controller::{
    DecorationController, DecorationFactory, DecorationType,
};
use crate::integrations::editor::diff_view::{scroll_editor_to_line, scroll_to_first_diff};
use crate::integrations::host::{Position, RevealType, TextEditor, TextRange};

pub trait EditorEffects: Send + Sync {
    /// A fresh editor is ready for streaming.
    fn begin(&mut self, editor: &Arc<dyn TextEditor>);

    /// Whether `begin` has set up everything streaming needs.
    fn is_ready(&self) -> bool;

    /// `end_line` lines of `line_count` have been streamed.
    fn progress(&mut self, end_line: usize, line_count: usize);

    /// The final content is in place.
    fn finish(&mut self);

    fn scroll_to_line(&self, editor: &dyn TextEditor, line: usize);

    fn scroll_to_first_diff(&self, editor: &dyn TextEditor, original: &str);

    /// Drop any per-editor state.
    fn end(&mut self);
}

/// Faded overlay over the unwritten part, highlighted active line, auto-scroll.
pub struct DecoratedEffects {
    factory: Arc<DecorationFactory>,
    faded: Option<DecorationController>,
    active: Option<DecorationController>,
}

impl DecoratedEffects {
    pub fn new(factory: Arc<DecorationFactory>) -> Self {
        Self {
            factory,
            faded: None,
            active: None,
        }
    }
}

impl EditorEffects for DecoratedEffects {
    fn begin(&mut self, editor: &Arc<dyn TextEditor>) {
        let mut faded =
            DecorationController::new(DecorationType::FadedOverlay, self.factory.clone(), editor.clone());
        let active =
            DecorationController::new(DecorationType::ActiveLine, self.factory.clone(), editor.clone());

        let line_count = editor.line_count().unwrap_or(0);
        faded.add_lines(0, line_count);

        let top = TextRange::new(Position::new(0, 0), Position::new(0, 0));
        if let Err(e) = editor.reveal_range(top, RevealType::InCenter) {
            tracing::debug!("Initial reveal skipped: {}", e);
        }

        self.faded = Some(faded);
        self.active = Some(active);
    }

    fn is_ready(&self) -> bool {
        self.faded.is_some() && self.active.is_some()
    }

    fn progress(&mut self, end_line: usize, line_count: usize) {
        if let Some(active) = self.active.as_mut() {
            active.set_active_line(end_line);
        }
        if let Some(faded) = self.faded.as_mut() {
            faded.update_overlay_after_line(end_line, line_count);
        }
    }

    fn finish(&mut self) {
        if let Some(faded) = self.faded.as_mut() {
            faded.clear();
        }
        if let Some(active) = self.active.as_mut() {
            active.clear();
        }
    }

    fn scroll_to_line(&self, editor: &dyn TextEditor, line: usize) {
        scroll_editor_to_line(editor, line);
    }

    fn scroll_to_first_diff(&self, editor: &dyn TextEditor, original: &str) {
        scroll_to_first_diff(editor, original);
    }

    fn end(&mut self) {
        self.faded = None;
        self.active = None;
    }
}

/// No decorations, no scrolling.
#[derive(Debug, Default)]
pub struct NoEffects;

impl EditorEffects for NoEffects {
    fn begin(&mut self, _editor: &Arc<dyn TextEditor>) {}

    fn is_ready(&self) -> bool {
        true
    }

    fn progress(&mut self, _end_line: usize, _line_count: usize) {}

    fn finish(&mut self) {}

    fn scroll_to_line(&self, _editor: &dyn TextEditor, _line: usize) {}

    fn scroll_to_first_diff(&self, _editor: &dyn TextEditor, _original: &str) {}

    fn end(&mut self) {}
}
