use test_context::test_context;

use super::EditorContext;
use crate::integrations::editor::{EditKind, ProviderState};

#[test_context(EditorContext)]
#[tokio::test]
async fn test_save_directly_creates_file_and_reports_it(ctx: &mut EditorContext) {
    let outcome = ctx
        .provider
        .save_directly("notes/todo.md", "- one\n- two\n", true)
        .await
        .unwrap();

    assert_eq!(outcome.edit_kind, EditKind::Create);
    assert_eq!(ctx.read("notes/todo.md"), "- one\n- two\n");
    assert_eq!(ctx.provider.state(), ProviderState::Saved);

    let written = ctx.provider.push_tool_write_result().unwrap();
    assert_eq!(written.path, "notes/todo.md");
    assert_eq!(written.operation, EditKind::Create);
    assert_eq!(written.user_edits, None);
    assert!(written.to_markup().contains("<operation>created</operation>"));
}

#[test_context(EditorContext)]
#[tokio::test]
async fn test_save_directly_backs_up_when_configured(ctx: &mut EditorContext) {
    ctx.write("config.toml", "a = 1\n");
    ctx.config.update(|config| config.diff_view.create_backups = true);

    let outcome = ctx
        .provider
        .save_directly("config.toml", "a = 2\n", false)
        .await
        .unwrap();

    assert_eq!(outcome.edit_kind, EditKind::Modify);
    let backup = outcome.backup_path.unwrap();
    assert_eq!(std::fs::read_to_string(backup).unwrap(), "a = 1\n");
    assert_eq!(ctx.read("config.toml"), "a = 2\n");
}

#[test_context(EditorContext)]
#[tokio::test]
async fn test_save_directly_rejected_during_diff_edit(ctx: &mut EditorContext) {
    ctx.write("main.rs", "fn main() {}\n");
    ctx.provider.open("main.rs").await.unwrap();

    let result = ctx.provider.save_directly("other.rs", "x\n", false).await;
    assert!(result.is_err());
    assert!(!ctx.path("other.rs").exists());
    assert!(ctx.provider.is_editing());

    ctx.provider.revert_changes().await.unwrap();
    assert_eq!(ctx.read("main.rs"), "fn main() {}\n");
}

#[test_context(EditorContext)]
#[tokio::test]
async fn test_write_result_requires_a_completed_write(ctx: &mut EditorContext) {
    assert!(ctx.provider.push_tool_write_result().is_err());
}
