use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use super::EditorContext;
use crate::fs::MockFileSystem;

/// With no user edits, the gateway receives exactly the normalized proposal.
#[tokio::test]
async fn test_save_writes_normalized_proposal_through_gateway() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("lib.rs");
    std::fs::write(&target, "fn a() {}\r\n").unwrap();

    let mut fs = MockFileSystem::new();
    let probe = target.clone();
    fs.expect_file_exists()
        .withf(move |path| path == probe.as_path())
        .returning(|_| true);
    let source = target.clone();
    fs.expect_read_file()
        .withf(move |path| path == source.as_path())
        .times(1)
        .returning(|_| Ok("fn a() {}\r\n".to_string()));
    let destination = target.clone();
    fs.expect_write_file()
        .withf(move |path: &Path, content: &str| {
            path == destination.as_path() && content == "fn b() {}\r\nfn c() {}\r\n"
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let mut ctx = EditorContext::in_dir(temp_dir, Arc::new(fs));
    ctx.provider.open("lib.rs").await.unwrap();
    // The restored trailing newline arrives as LF and must still be written as CRLF
    ctx.provider.update("fn b() {}\r\nfn c() {}", true).await.unwrap();

    let result = ctx.provider.save_changes().await.unwrap();
    assert_eq!(result.user_edits, None);
    assert_eq!(result.final_content.as_deref(), Some("fn b() {}\r\nfn c() {}\r\n"));

    ctx.provider.dispose();
}

#[tokio::test]
async fn test_failed_write_leaves_session_editing() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("ro.txt");
    std::fs::write(&target, "a\n").unwrap();

    let mut fs = MockFileSystem::new();
    fs.expect_file_exists().returning(|_| true);
    fs.expect_read_file().returning(|_| Ok("a\n".to_string()));
    fs.expect_write_file().returning(|path, _| {
        Err(crate::error::EditError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        ))
    });

    let mut ctx = EditorContext::in_dir(temp_dir, Arc::new(fs));
    ctx.provider.open("ro.txt").await.unwrap();
    ctx.provider.update("b\n", true).await.unwrap();

    let error = ctx.provider.save_changes().await.unwrap_err();
    assert!(error.to_string().contains("ro.txt"));
    assert!(ctx.provider.is_editing());
}
