//! The structured notice handed back to whoever requested the edit.

use serde::{Serialize, Serializer};
use similar::TextDiff;
use std::fmt::Write as _;

use crate::integrations::editor::session::{EditKind, SaveResult};

const DIFF_CONTEXT_LINES: usize = 3;

/// Escape the three characters the consumer's parser cares about. Nothing else.
pub fn escape_markup(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// `created` or `modified`, the same words the markup uses.
fn serialize_operation<S>(kind: &EditKind, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(kind.past_tense())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolWriteResult {
    pub path: String,
    #[serde(serialize_with = "serialize_operation")]
    pub operation: EditKind,
    /// Unified diff from the proposed content to what was saved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_edits: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problems: Option<String>,
    pub notices: Vec<String>,
}

impl ToolWriteResult {
    pub fn to_markup(&self) -> String {
        let mut out = String::from("<file_write_result>\n");
        let _ = writeln!(out, "<path>{}</path>", escape_markup(&self.path));
        let _ = writeln!(out, "<operation>{}</operation>", self.operation.past_tense());
        if let Some(user_edits) = &self.user_edits {
            let _ = writeln!(out, "<user_edits>\n{}</user_edits>", escape_markup(user_edits));
        }
        if let Some(problems) = &self.problems {
            let _ = writeln!(out, "<problems>\n{}\n</problems>", escape_markup(problems));
        }
        if !self.notices.is_empty() {
            out.push_str("<notice>\n");
            for notice in &self.notices {
                let _ = writeln!(out, "<i>{}</i>", escape_markup(notice));
            }
            out.push_str("</notice>\n");
        }
        out.push_str("</file_write_result>");
        out
    }
}

/// Describe a completed write for the upstream transcript.
pub fn push_tool_write_result(
    rel_path: &str,
    edit_kind: EditKind,
    proposed_content: &str,
    result: &SaveResult,
) -> ToolWriteResult {
    let final_content = result.final_content.as_deref().unwrap_or(proposed_content);

    let user_edits = result.user_edits.as_ref().map(|_| {
        TextDiff::from_lines(proposed_content, final_content)
            .unified_diff()
            .context_radius(DIFF_CONTEXT_LINES)
            .header(rel_path, rel_path)
            .to_string()
    });

    let problems = result
        .new_problems_message
        .as_deref()
        .map(str::trim)
        .filter(|problems| !problems.is_empty())
        .map(str::to_string);

    let mut notices = Vec::new();
    if user_edits.is_some() {
        notices.push(
            "The user edited the proposed content before saving. The diff above shows their changes; \
             keep them in any follow-up edits."
                .to_string(),
        );
    }
    notices.push(format!(
        "The file was {} and its final content is now on disk. Use it as the baseline for further edits to {}.",
        edit_kind.past_tense(),
        rel_path
    ));
    if problems.is_some() {
        notices.push("Address the new problems listed above if this edit caused them.".to_string());
    }

    ToolWriteResult {
        path: rel_path.to_string(),
        operation: edit_kind,
        user_edits,
        problems,
        notices,
    }
}
