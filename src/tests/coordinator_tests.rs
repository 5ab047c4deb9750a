use std::sync::Arc;
use tempfile::TempDir;
use test_context::test_context;

use super::EditorContext;
use crate::context::SessionContext;
use crate::error::EditError;
use crate::fs::LocalFileSystem;
use crate::integrations::diagnostics::NEW_PROBLEMS_BANNER;
use crate::integrations::editor::{
    DIFF_EDITOR_OPEN_TIMEOUT, DiffViewProvider, EditKind, NoEffects, ProviderState,
};
use crate::integrations::headless::DiffOpenBehavior;
use crate::integrations::host::{
    Diagnostic, DiagnosticSeverity, EditorHost, ShowOptions, TabInput, TextRange,
};

#[test_context(EditorContext)]
#[tokio::test]
async fn test_modify_stream_and_save(ctx: &mut EditorContext) {
    ctx.write("lib.rs", "fn old() {}\n");

    let editor = ctx.provider.open("lib.rs").await.expect("open should succeed");
    assert_eq!(ctx.provider.state(), ProviderState::Editing);
    let session = ctx.provider.session().unwrap();
    assert_eq!(session.edit_kind, EditKind::Modify);
    assert_eq!(session.original_content, "fn old() {}\n");
    assert!(session.created_directories.is_empty());
    assert_eq!(
        ctx.host.diff_original(&ctx.path("lib.rs")).as_deref(),
        Some("fn old() {}\n")
    );

    let progress = ctx.provider.update("fn new() {}\nfn sec", false).await.unwrap();
    assert_eq!(progress.end_line, 1);
    assert_eq!(editor.text().unwrap(), "fn new() {}\n");

    ctx.provider.update("fn new() {}\nfn second() {}", true).await.unwrap();
    assert_eq!(
        ctx.provider.session().unwrap().streamed_content.as_deref(),
        Some("fn new() {}\nfn second() {}")
    );

    let result = ctx.provider.save_changes().await.expect("save should succeed");
    assert_eq!(result.user_edits, None);
    assert_eq!(result.new_problems_message, None);
    assert_eq!(result.final_content.as_deref(), Some("fn new() {}\nfn second() {}\n"));
    assert_eq!(ctx.read("lib.rs"), "fn new() {}\nfn second() {}\n");
    assert_eq!(ctx.provider.state(), ProviderState::Saved);
    assert!(
        ctx.host
            .tabs()
            .iter()
            .all(|tab| !matches!(tab.input, TabInput::Diff { .. })),
        "Diff view should be closed after saving"
    );

    let markup = ctx.provider.push_tool_write_result().unwrap().to_markup();
    assert!(markup.contains("<path>lib.rs</path>"));
    assert!(markup.contains("<operation>modified</operation>"));
    assert!(!markup.contains("<user_edits>"));
}

#[test_context(EditorContext)]
#[tokio::test]
async fn test_create_then_revert_removes_directories(ctx: &mut EditorContext) {
    ctx.provider.open("deep/nested/new.rs").await.unwrap();

    let session = ctx.provider.session().unwrap();
    assert_eq!(session.edit_kind, EditKind::Create);
    assert_eq!(session.original_content, "");
    assert_eq!(
        session.created_directories,
        vec![ctx.path("deep"), ctx.path("deep/nested")]
    );
    assert!(ctx.path("deep/nested/new.rs").exists());

    ctx.provider.update("pub fn x() {}\n", true).await.unwrap();
    ctx.provider.revert_changes().await.expect("revert should succeed");

    assert_eq!(ctx.provider.state(), ProviderState::Reverted);
    assert!(!ctx.path("deep/nested/new.rs").exists());
    assert!(!ctx.path("deep/nested").exists());
    assert!(!ctx.path("deep").exists());
}

#[test_context(EditorContext)]
#[tokio::test]
async fn test_create_revert_keeps_directories_when_cleanup_disabled(ctx: &mut EditorContext) {
    ctx.config
        .update(|config| config.diff_view.cleanup_created_directories = false);

    ctx.provider.open("gen/out/new.rs").await.unwrap();
    ctx.provider.update("pub fn y() {}\n", true).await.unwrap();
    let target = ctx.path("gen/out/new.rs");
    assert!(
        ctx.host
            .text_documents()
            .iter()
            .any(|document| document.path == target && document.is_dirty),
        "streamed content should leave the document dirty"
    );

    ctx.provider.revert_changes().await.unwrap();

    assert!(!target.exists());
    assert!(ctx.path("gen/out").is_dir());
    assert!(ctx.path("gen").is_dir());
    // The discarded document was saved first, so nothing blocked closing the diff view
    assert!(
        ctx.host
            .text_documents()
            .iter()
            .all(|document| document.path != target || !document.is_dirty)
    );
    assert!(
        ctx.host
            .tabs()
            .iter()
            .all(|tab| !matches!(tab.input, TabInput::Diff { .. }))
    );
}

#[test_context(EditorContext)]
#[tokio::test]
async fn test_create_and_save_new_file(ctx: &mut EditorContext) {
    ctx.provider.open("src/new.rs").await.unwrap();
    ctx.provider.update("line 1\nline", false).await.unwrap();
    ctx.provider.update("line 1\nline 2", true).await.unwrap();

    let result = ctx.provider.save_changes().await.unwrap();
    assert_eq!(result.user_edits, None);
    assert_eq!(ctx.read("src/new.rs"), "line 1\nline 2");

    let written = ctx.provider.push_tool_write_result().unwrap();
    assert_eq!(written.operation, EditKind::Create);
    assert!(written.to_markup().contains("<operation>created</operation>"));
}

#[test_context(EditorContext)]
#[tokio::test]
async fn test_user_edits_win_and_are_reported(ctx: &mut EditorContext) {
    ctx.write("notes.md", "a\n");

    let editor = ctx.provider.open("notes.md").await.unwrap();
    ctx.provider.update("b\n", true).await.unwrap();
    editor
        .replace(TextRange::everything(), "b\nadded by user\n")
        .await
        .unwrap();

    let result = ctx.provider.save_changes().await.unwrap();
    assert_eq!(result.user_edits.as_deref(), Some("b\nadded by user\n"));
    assert_eq!(ctx.read("notes.md"), "b\nadded by user\n");

    let written = ctx.provider.push_tool_write_result().unwrap();
    assert!(written.user_edits.as_deref().unwrap().contains("+added by user"));
}

#[test_context(EditorContext)]
#[tokio::test]
async fn test_crlf_content_is_not_a_user_edit(ctx: &mut EditorContext) {
    ctx.write("win.txt", "a\r\nb\r\n");

    ctx.provider.open("win.txt").await.unwrap();
    ctx.provider.update("\u{FEFF}x\r\ny\r\n", true).await.unwrap();

    let result = ctx.provider.save_changes().await.unwrap();
    assert_eq!(result.user_edits, None);
    assert_eq!(ctx.read("win.txt"), "x\r\ny\r\n");
}

#[test_context(EditorContext)]
#[tokio::test]
async fn test_lost_editor_fails_fast_and_revert_still_works(ctx: &mut EditorContext) {
    ctx.write("main.rs", "fn main() {}\n");
    ctx.provider.open("main.rs").await.unwrap();
    ctx.provider.update("fn main() { todo!() }\n", false).await.unwrap();

    ctx.host.close_editor(&ctx.path("main.rs"));

    let result = ctx.provider.update("fn main() { todo!() }\n// more\n", false).await;
    match result {
        Err(EditError::EditorClosed { path }) => assert_eq!(path, ctx.path("main.rs")),
        other => panic!("expected EditorClosed, got {:?}", other),
    }
    assert_eq!(
        ctx.provider.session().unwrap().streamed_content.as_deref(),
        Some("fn main() { todo!() }\n// more\n")
    );

    let validation = ctx.provider.validate_save();
    assert!(!validation.valid);
    assert!(matches!(
        ctx.provider.save_changes().await,
        Err(EditError::Validation(_))
    ));

    ctx.provider.revert_changes().await.unwrap();
    assert_eq!(ctx.read("main.rs"), "fn main() {}\n");
}

#[test_context(EditorContext)]
#[tokio::test]
async fn test_terminal_state_rejects_updates_and_reset_is_idempotent(ctx: &mut EditorContext) {
    ctx.write("a.txt", "1\n");
    ctx.provider.open("a.txt").await.unwrap();
    ctx.provider.update("2\n", true).await.unwrap();
    ctx.provider.save_changes().await.unwrap();

    assert!(matches!(
        ctx.provider.update("3\n", true).await,
        Err(EditError::InvalidState(_))
    ));
    assert_eq!(ctx.read("a.txt"), "2\n");

    ctx.provider.reset();
    ctx.provider.reset();
    assert_eq!(ctx.provider.state(), ProviderState::Idle);
    assert!(ctx.provider.session().is_none());
    assert!(matches!(
        ctx.provider.revert_changes().await,
        Err(EditError::InvalidState(_))
    ));
}

#[test_context(EditorContext)]
#[tokio::test]
async fn test_second_open_while_editing_is_rejected(ctx: &mut EditorContext) {
    ctx.write("one.txt", "1\n");
    ctx.provider.open("one.txt").await.unwrap();

    assert!(matches!(
        ctx.provider.open("two.txt").await,
        Err(EditError::InvalidState(_))
    ));
    assert!(!ctx.path("two.txt").exists());
}

#[test_context(EditorContext)]
#[tokio::test]
async fn test_dirty_document_is_saved_before_reading_original(ctx: &mut EditorContext) {
    ctx.write("draft.txt", "on disk\n");
    let plain = ctx
        .host
        .show_text_document(&ctx.path("draft.txt"), ShowOptions::default())
        .await
        .unwrap();
    plain
        .replace(TextRange::everything(), "unsaved work\n")
        .await
        .unwrap();

    ctx.provider.open("draft.txt").await.unwrap();

    assert_eq!(
        ctx.provider.session().unwrap().original_content,
        "unsaved work\n"
    );
    let tabs = ctx.host.tabs();
    assert_eq!(tabs.len(), 1, "plain tab should have been replaced by the diff view");
    assert!(matches!(tabs[0].input, TabInput::Diff { .. }));
}

#[test_context(EditorContext)]
#[tokio::test]
async fn test_new_errors_are_reported_on_save(ctx: &mut EditorContext) {
    ctx.write("lib.rs", "pub fn ok() {}\n");
    ctx.provider.open("lib.rs").await.unwrap();
    ctx.provider.update("pub fn broken( {}\n", true).await.unwrap();

    ctx.host.set_diagnostics(vec![(
        ctx.path("lib.rs"),
        vec![
            Diagnostic::new(TextRange::lines(0, 0), "expected one of `)`", DiagnosticSeverity::Error)
                .with_source("rustc"),
            Diagnostic::new(TextRange::lines(0, 0), "unused function", DiagnosticSeverity::Warning),
        ],
    )]);

    let result = ctx.provider.save_changes().await.unwrap();
    let message = result.new_problems_message.expect("new problems expected");
    assert!(message.contains(NEW_PROBLEMS_BANNER));
    assert!(message.contains("lib.rs"));
    assert!(message.contains("[rustc Error] Line 1: expected one of `)`"));
    assert!(!message.contains("unused function"));

    let markup = ctx.provider.push_tool_write_result().unwrap().to_markup();
    assert!(markup.contains("<problems>"));
}

#[test_context(EditorContext)]
#[tokio::test]
async fn test_settings_changes_apply_mid_session(ctx: &mut EditorContext) {
    ctx.write("lib.rs", "pub fn ok() {}\n");
    ctx.provider.open("lib.rs").await.unwrap();
    ctx.provider.update("pub fn broken( {}\n", true).await.unwrap();
    ctx.host.set_diagnostics(vec![(
        ctx.path("lib.rs"),
        vec![Diagnostic::new(TextRange::lines(0, 0), "syntax error", DiagnosticSeverity::Error)],
    )]);

    ctx.config
        .update(|config| config.diagnostics.include_messages = false);

    let result = ctx.provider.save_changes().await.unwrap();
    assert_eq!(result.new_problems_message, None);
}

#[test_context(EditorContext)]
#[tokio::test]
async fn test_streaming_scrolls_only_when_content_leaves_the_viewport(ctx: &mut EditorContext) {
    let original: String = (0..100).map(|i| format!("old {}\n", i)).collect();
    ctx.write("long.txt", &original);
    ctx.provider.open("long.txt").await.unwrap();
    let headless = ctx.host.editor_for(&ctx.path("long.txt")).unwrap();
    let reveals_after_open = headless.revealed().len();

    let short: String = (0..10).map(|i| format!("new {}\n", i)).collect();
    ctx.provider.update(&short, false).await.unwrap();
    assert_eq!(headless.revealed().len(), reveals_after_open);

    let long: String = (0..60).map(|i| format!("new {}\n", i)).collect();
    ctx.provider.update(&long, false).await.unwrap();
    let (range, _) = headless.revealed().last().copied().unwrap();
    assert_eq!(range.start.line, 64);
}

#[test_context(EditorContext)]
#[tokio::test(start_paused = true)]
async fn test_open_times_out_and_revert_cleans_up(ctx: &mut EditorContext) {
    ctx.host.set_diff_behavior(DiffOpenBehavior::Never);

    let result = ctx.provider.open("pending/slow.rs").await;
    let error = match result {
        Err(error) => error,
        Ok(_) => panic!("open should time out"),
    };
    match &error {
        EditError::Timeout { path, timeout } => {
            assert_eq!(path, &ctx.path("pending/slow.rs"));
            assert_eq!(*timeout, DIFF_EDITOR_OPEN_TIMEOUT);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(error.to_string().contains("slow.rs"));
    assert_eq!(ctx.host.listener_count(), 0);
    assert!(ctx.provider.is_editing());

    ctx.provider.revert_changes().await.unwrap();
    assert!(!ctx.path("pending").exists());
}

#[tokio::test]
async fn test_cosmetic_strategy_does_not_change_the_edit() {
    for plain in [false, true] {
        let mut ctx = EditorContext::in_dir(TempDir::new().unwrap(), Arc::new(LocalFileSystem::new()));
        if plain {
            ctx.provider = DiffViewProvider::new(
                ctx.host.clone(),
                Arc::new(LocalFileSystem::new()),
                ctx.temp_dir.path(),
                SessionContext::new(&ctx.settings),
            )
            .with_effects(Box::new(NoEffects));
        }
        ctx.write("f.txt", "x\ny\n");
        ctx.provider.open("f.txt").await.unwrap();
        ctx.provider.update("a\n", false).await.unwrap();
        ctx.provider.update("a\nb", true).await.unwrap();
        ctx.provider.save_changes().await.unwrap();
        assert_eq!(ctx.read("f.txt"), "a\nb\n");
        ctx.provider.dispose();
        assert_eq!(ctx.host.live_decoration_types(), 0);
    }
}
