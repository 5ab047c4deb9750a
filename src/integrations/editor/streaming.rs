use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{EditError, HostError};
use crate::integrations::editor::effects::EditorEffects;
use crate::integrations::host::{Position, TextEditor, TextRange};
use crate::text::strip_all_boms;

fn editor_error(path: &Path, error: HostError) -> EditError {
    match error {
        HostError::EditorDisposed => EditError::EditorClosed {
            path: path.to_path_buf(),
        },
        other => other.into(),
    }
}

/// The complete content as it should end up in the editor: BOM-free, with a
/// trailing newline exactly when `original_content` had one and the stream didn't.
pub fn finalize_content(accumulated_content: &str, original_content: &str) -> String {
    let mut content = strip_all_boms(accumulated_content).into_owned();
    if original_content.ends_with('\n') && !content.ends_with('\n') {
        content.push('\n');
    }
    content
}

/// Result of one streaming step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamProgress {
    /// Number of lines now confirmed in the editor.
    pub end_line: usize,
    pub is_final: bool,
}

/// Rewrites the editable side of the comparison view as content streams in.
#[derive(Debug, Default)]
pub struct StreamingApplier {
    streamed_lines: Vec<String>,
}

impl StreamingApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn streamed_lines(&self) -> &[String] {
        &self.streamed_lines
    }

    pub fn reset(&mut self) {
        self.streamed_lines.clear();
    }

    /// Apply the content accumulated so far.
    ///
    /// Non-final updates hold back the trailing partial line. The final update
    /// removes whatever was not overwritten and writes the complete content,
    /// keeping a trailing newline exactly when `original_content` had one.
    pub async fn update_streaming_content(
        &mut self,
        editor: &Arc<dyn TextEditor>,
        accumulated_content: &str,
        is_final: bool,
        original_content: &str,
        effects: &mut dyn EditorEffects,
    ) -> Result<StreamProgress, EditError> {
        let path = editor.path().to_path_buf();
        if editor.is_closed() {
            return Err(EditError::EditorClosed { path });
        }

        let content = strip_all_boms(accumulated_content);
        let mut lines: Vec<&str> = content.split('\n').collect();
        if !is_final {
            lines.pop();
        }
        let end_line = lines.len();

        if !is_final {
            if end_line > 0 {
                let mut replacement = lines.join("\n");
                replacement.push('\n');
                editor
                    .replace(TextRange::lines(0, end_line), &replacement)
                    .await
                    .map_err(|e| editor_error(&path, e))?;
                editor
                    .set_cursor(Position::new(0, 0))
                    .map_err(|e| editor_error(&path, e))?;

                let line_count = editor.line_count().map_err(|e| editor_error(&path, e))?;
                effects.progress(end_line, line_count);
                trace!("Streamed {} of {} lines into {}", end_line, line_count, path.display());
            }
            self.streamed_lines = lines.into_iter().map(str::to_string).collect();
            return Ok(StreamProgress { end_line, is_final });
        }

        let line_count = editor.line_count().map_err(|e| editor_error(&path, e))?;
        if self.streamed_lines.len() < line_count {
            editor
                .replace(TextRange::lines(self.streamed_lines.len(), line_count), "")
                .await
                .map_err(|e| editor_error(&path, e))?;
        }

        let final_content = finalize_content(&content, original_content);
        editor
            .replace(TextRange::everything(), &final_content)
            .await
            .map_err(|e| editor_error(&path, e))?;

        effects.finish();
        self.streamed_lines = final_content.split('\n').map(str::to_string).collect();
        debug!("Finalized {} ({} lines)", path.display(), end_line);

        Ok(StreamProgress { end_line, is_final })
    }
}
