use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::context::SessionContext;
use crate::fs::{display_relative, paths_equal};
use crate::integrations::host::{Diagnostic, DiagnosticSeverity, DiagnosticSnapshot, EditorHost};

/// Prefix of every non-empty "new problems" message.
pub const NEW_PROBLEMS_BANNER: &str = "New problems detected after saving the file:";

fn same_problem(a: &Diagnostic, b: &Diagnostic) -> bool {
    a.range == b.range && a.message == b.message
}

/// Diagnostics present in `post` but not in `pre`, keyed on file, range and message.
pub fn get_new_diagnostics(pre: &DiagnosticSnapshot, post: &DiagnosticSnapshot) -> DiagnosticSnapshot {
    let mut new_diagnostics = Vec::new();
    for (path, post_diagnostics) in post {
        let baseline: &[Diagnostic] = pre
            .iter()
            .find(|(pre_path, _)| paths_equal(pre_path, path))
            .map(|(_, diagnostics)| diagnostics.as_slice())
            .unwrap_or_default();

        let fresh: Vec<Diagnostic> = post_diagnostics
            .iter()
            .filter(|diagnostic| !baseline.iter().any(|old| same_problem(old, diagnostic)))
            .cloned()
            .collect();

        if !fresh.is_empty() {
            new_diagnostics.push((path.clone(), fresh));
        }
    }
    new_diagnostics
}

/// Formats diagnostics of the given severities, grouped by file.
///
/// `max_messages` of 0 means no limit; anything past the limit is summarized
/// in a trailing line.
pub fn diagnostics_to_problems_string(
    diagnostics: &DiagnosticSnapshot,
    severities: &[DiagnosticSeverity],
    cwd: &Path,
    max_messages: usize,
) -> String {
    let mut result = String::new();
    let mut emitted = 0usize;
    let mut omitted = 0usize;

    for (path, file_diagnostics) in diagnostics {
        let mut header_written = false;
        for diagnostic in file_diagnostics
            .iter()
            .filter(|diagnostic| severities.contains(&diagnostic.severity))
        {
            if max_messages > 0 && emitted >= max_messages {
                omitted += 1;
                continue;
            }
            if !header_written {
                result.push_str("\n\n");
                result.push_str(&display_relative(path, cwd));
                header_written = true;
            }
            let source = diagnostic
                .source
                .as_deref()
                .map(|source| format!("{} ", source))
                .unwrap_or_default();
            result.push_str(&format!(
                "\n- [{}{}] Line {}: {}",
                source,
                diagnostic.severity.label(),
                diagnostic.range.start.line + 1,
                diagnostic.message
            ));
            emitted += 1;
        }
    }

    if omitted > 0 {
        result.push_str(&format!("\n\n({} more problems omitted)", omitted));
    }

    result.trim().to_string()
}

/// Captures editor-wide diagnostics before an edit and reports what the edit introduced.
pub struct DiagnosticsSnapshotter {
    host: Arc<dyn EditorHost>,
    context: SessionContext,
    pre_diagnostics: Option<DiagnosticSnapshot>,
}

impl DiagnosticsSnapshotter {
    pub fn new(host: Arc<dyn EditorHost>, context: SessionContext) -> Self {
        Self {
            host,
            context,
            pre_diagnostics: None,
        }
    }

    /// Record the baseline. Must run before the file is touched.
    pub fn capture_diagnostics(&mut self) {
        let snapshot = self.host.diagnostics();
        debug!("Captured diagnostics baseline for {} files", snapshot.len());
        self.pre_diagnostics = Some(snapshot);
    }

    pub fn has_baseline(&self) -> bool {
        self.pre_diagnostics.is_some()
    }

    pub fn clear(&mut self) {
        self.pre_diagnostics = None;
    }

    /// New error-level problems since [`capture_diagnostics`](Self::capture_diagnostics),
    /// formatted behind [`NEW_PROBLEMS_BANNER`]. Empty when there are none.
    pub async fn process_new_diagnostics(&mut self, write_delay_ms: i64, cwd: &Path) -> String {
        self.process_new_diagnostics_with(write_delay_ms, cwd, &[DiagnosticSeverity::Error])
            .await
    }

    /// Same as [`process_new_diagnostics`](Self::process_new_diagnostics) for arbitrary severities.
    pub async fn process_new_diagnostics_with(
        &mut self,
        write_delay_ms: i64,
        cwd: &Path,
        severities: &[DiagnosticSeverity],
    ) -> String {
        // Read fresh on every call so mid-session changes are honored
        let settings = self.context.settings();
        if !settings.include_diagnostic_messages {
            return String::new();
        }

        settle(write_delay_ms).await;

        let pre = self.pre_diagnostics.clone().unwrap_or_else(|| {
            warn!("No diagnostics baseline captured; treating every problem as new");
            Vec::new()
        });
        let post = self.host.diagnostics();
        let new_diagnostics = get_new_diagnostics(&pre, &post);
        let problems = diagnostics_to_problems_string(
            &new_diagnostics,
            severities,
            cwd,
            settings.max_diagnostic_messages,
        );

        if problems.is_empty() {
            String::new()
        } else {
            format!("\n\n{}\n{}", NEW_PROBLEMS_BANNER, problems)
        }
    }
}

/// Give external linters time to react to a write. Negative delays mean none.
async fn settle(write_delay_ms: i64) {
    let delay = u64::try_from(write_delay_ms).unwrap_or(0);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}
