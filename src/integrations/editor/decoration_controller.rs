use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::integrations::host::{DecorationKey, DecorationStyle, EditorHost, TextEditor, TextRange};

/// Represents a text decoration range with start and end line numbers (inclusive)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecorationRange {
    pub start_line: usize,
    pub end_line: usize,
}

impl DecorationRange {
    fn to_text_range(&self) -> TextRange {
        TextRange::whole_lines(self.start_line, self.end_line)
    }
}

/// Defines available decoration types with their visual properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecorationType {
    FadedOverlay,
    ActiveLine,
}

impl DecorationType {
    pub fn style(&self) -> DecorationStyle {
        match self {
            DecorationType::FadedOverlay => DecorationStyle {
                background_color: Some("rgba(255, 255, 0, 0.1)".to_string()),
                border_color: None,
                border_style: None,
                border_width: None,
                opacity: Some("0.4".to_string()),
                is_whole_line: true,
            },
            DecorationType::ActiveLine => DecorationStyle {
                background_color: Some("rgba(255, 255, 0, 0.3)".to_string()),
                border_color: Some("rgba(255, 255, 0, 0.5)".to_string()),
                border_style: Some("solid".to_string()),
                border_width: Some("1px".to_string()),
                opacity: Some("1".to_string()),
                is_whole_line: true,
            },
        }
    }
}

/// Owns the host decoration types for one activation.
///
/// Types are registered lazily on first use and all released by [`dispose`](Self::dispose).
pub struct DecorationFactory {
    host: Arc<dyn EditorHost>,
    keys: Mutex<HashMap<DecorationType, DecorationKey>>,
}

impl DecorationFactory {
    pub fn new(host: Arc<dyn EditorHost>) -> Self {
        Self {
            host,
            keys: Mutex::new(HashMap::new()),
        }
    }

    pub fn key(&self, decoration_type: DecorationType) -> DecorationKey {
        self.keys
            .lock()
            .entry(decoration_type)
            .or_insert_with(|| self.host.create_decoration_type(&decoration_type.style()))
            .clone()
    }

    pub fn registered(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn dispose(&self) {
        for (_, key) in self.keys.lock().drain() {
            self.host.dispose_decoration_type(&key);
        }
    }
}

/// Controls one kind of decoration on one editor
pub struct DecorationController {
    decoration_type: DecorationType,
    factory: Arc<DecorationFactory>,
    editor: Arc<dyn TextEditor>,
    ranges: Vec<DecorationRange>,
}

impl DecorationController {
    pub fn new(
        decoration_type: DecorationType,
        factory: Arc<DecorationFactory>,
        editor: Arc<dyn TextEditor>,
    ) -> Self {
        Self {
            decoration_type,
            factory,
            editor,
            ranges: Vec::new(),
        }
    }

    pub fn ranges(&self) -> &[DecorationRange] {
        &self.ranges
    }

    /// Decorate `count` lines starting at `start_line`.
    pub fn add_lines(&mut self, start_line: usize, count: usize) {
        if count == 0 {
            return;
        }
        let mut ranges = std::mem::take(&mut self.ranges);
        ranges.push(DecorationRange {
            start_line,
            end_line: start_line + count - 1,
        });
        self.ranges = merge_ranges(ranges);
        self.apply();
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
        self.apply();
    }

    /// Decorate everything below `line` in a document of `total_lines` lines.
    pub fn update_overlay_after_line(&mut self, line: usize, total_lines: usize) {
        self.ranges.clear();
        if line + 1 < total_lines {
            self.ranges.push(DecorationRange {
                start_line: line + 1,
                end_line: total_lines - 1,
            });
        }
        self.apply();
    }

    pub fn set_active_line(&mut self, line: usize) {
        self.ranges = vec![DecorationRange {
            start_line: line,
            end_line: line,
        }];
        self.apply();
    }

    fn apply(&self) {
        let key = self.factory.key(self.decoration_type);
        let ranges: Vec<TextRange> = self.ranges.iter().map(DecorationRange::to_text_range).collect();
        // Decorations are cosmetic; a disposed editor must not fail the edit
        if let Err(e) = self.editor.set_decorations(&key, &ranges) {
            warn!(
                "Failed to apply {:?} decorations to {}: {}",
                self.decoration_type,
                self.editor.path().display(),
                e
            );
        }
    }
}

/// Merges overlapping or adjacent ranges for efficient decoration application
fn merge_ranges(mut ranges: Vec<DecorationRange>) -> Vec<DecorationRange> {
    if ranges.is_empty() {
        return ranges;
    }

    ranges.sort_by_key(|r| r.start_line);

    let mut merged = Vec::new();
    let mut current = ranges[0].clone();

    for range in ranges.into_iter().skip(1) {
        if range.start_line <= current.end_line + 1 {
            current.end_line = current.end_line.max(range.end_line);
        } else {
            merged.push(current);
            current = range;
        }
    }
    merged.push(current);

    merged
}
