pub mod diagnostics;
pub mod editor;
pub mod headless;
pub mod host;

use std::path::{Path, PathBuf};

use crate::error::EditError;

/// The workspace the engine resolves relative paths against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    /// Root path of the workspace
    pub root_path: PathBuf,
    /// Name of the workspace
    pub name: String,
}

/// Resolve the workspace root: the given directory, or the current one.
pub fn detect_workspace(root: Option<&Path>) -> Result<WorkspaceConfig, EditError> {
    let workspace_root = match root {
        Some(root) => root.to_path_buf(),
        None => std::env::current_dir().map_err(|e| EditError::io(".", e))?,
    };
    let workspace_root = workspace_root
        .canonicalize()
        .map_err(|e| EditError::io(&workspace_root, e))?;
    if !workspace_root.is_dir() {
        return Err(EditError::Validation(format!(
            "workspace root {} is not a directory",
            workspace_root.display()
        )));
    }

    let name = workspace_root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(WorkspaceConfig {
        root_path: workspace_root,
        name,
    })
}
