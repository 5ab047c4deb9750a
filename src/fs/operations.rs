use crate::error::EditError;
use async_trait::async_trait;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Normalizes a path to use platform-specific separators and resolves relative components
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::Normal(name) => normalized.push(name),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
        }
    }
    normalized
}

/// Resolves a workspace-relative path against `cwd`. Absolute paths are kept as given.
pub fn resolve_absolute_path(cwd: &Path, rel_path: impl AsRef<Path>) -> PathBuf {
    normalize_path(&cwd.join(rel_path))
}

/// Compares two paths after normalization
pub fn paths_equal(a: &Path, b: &Path) -> bool {
    let (a, b) = (normalize_path(a), normalize_path(b));
    if cfg!(windows) {
        a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
    } else {
        a == b
    }
}

/// Renders `path` relative to `cwd` with forward slashes, or as-is when outside it.
pub fn display_relative(path: &Path, cwd: &Path) -> String {
    let relative = path.strip_prefix(cwd).unwrap_or(path);
    relative.to_string_lossy().replace('\\', "/")
}

/// Retry a fallible operation with exponential backoff
async fn retry_operation<F, T>(mut operation: F) -> Result<T, EditError>
where
    F: FnMut() -> Result<T, EditError>,
{
    let mut retries = 0;
    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(err) if err.is_transient() && retries < MAX_RETRIES => {
                tokio::time::sleep(RETRY_DELAY * 2_u32.pow(retries)).await;
                retries += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Replace `path` in one step: fill a sibling temp file, sync it, then rename it over the target.
///
/// On any failure the temp file is removed and `path` keeps its previous content.
fn replace_file<F>(path: &Path, fill: F) -> Result<(), EditError>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or(0);
    let temp_path = dir.join(format!(
        ".{}.redline-tmp-{}-{}",
        file_name,
        std::process::id(),
        nanos
    ));

    let written = File::create(&temp_path).and_then(|mut file| {
        fill(&mut file)?;
        file.sync_all()?;
        // Keep the mode of the file being replaced
        if let Ok(metadata) = fs::metadata(path) {
            file.set_permissions(metadata.permissions())?;
        }
        Ok(())
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(EditError::io(path, e));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        EditError::io(path, e)
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    pub size: u64,
    pub is_file: bool,
    pub is_dir: bool,
    pub modified: Option<SystemTime>,
}

/// Gateway for every filesystem touch the edit engine makes.
///
/// Read, write, copy and delete failures carry the offending path. Directory
/// removal is best-effort cleanup and never fails.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Check if a file exists.
    async fn file_exists(&self, path: &Path) -> bool;

    /// Read a file as a string.
    async fn read_file(&self, path: &Path) -> Result<String, EditError>;

    /// Write a string to a file. Parent directories must already exist.
    ///
    /// Either the whole content lands or the previous file is left untouched.
    async fn write_file(&self, path: &Path, content: &str) -> Result<(), EditError>;

    /// Create the missing parent directories of `path`.
    ///
    /// Returns only the directories that were actually created, outermost first.
    async fn create_directories_for_file(&self, path: &Path) -> Result<Vec<PathBuf>, EditError>;

    /// Delete a file.
    async fn delete_file(&self, path: &Path) -> Result<(), EditError>;

    /// Remove the given directories innermost-first, logging anything that can't be removed.
    async fn remove_directories(&self, dirs: &[PathBuf]);

    /// Copy a file.
    async fn copy_file(&self, from: &Path, to: &Path) -> Result<(), EditError>;

    /// Get size, kind and modification time.
    async fn file_stats(&self, path: &Path) -> Result<FileStats, EditError>;
}

/// Concrete implementation of FileSystem.
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        LocalFileSystem
    }
}

impl Default for LocalFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn file_exists(&self, path: &Path) -> bool {
        normalize_path(path).is_file()
    }

    async fn read_file(&self, path: &Path) -> Result<String, EditError> {
        let normalized = normalize_path(path);
        retry_operation(|| {
            let mut file = File::open(&normalized).map_err(|e| EditError::io(&normalized, e))?;
            let mut content = String::new();
            file.read_to_string(&mut content)
                .map_err(|e| EditError::io(&normalized, e))?;
            Ok(content)
        })
        .await
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<(), EditError> {
        let normalized = normalize_path(path);
        retry_operation(|| replace_file(&normalized, |file| file.write_all(content.as_bytes())))
            .await
    }

    async fn create_directories_for_file(&self, path: &Path) -> Result<Vec<PathBuf>, EditError> {
        let normalized = normalize_path(path);
        let mut missing = Vec::new();
        let mut current = normalized.parent();
        while let Some(dir) = current {
            if dir.as_os_str().is_empty() || dir.exists() {
                break;
            }
            missing.push(dir.to_path_buf());
            current = dir.parent();
        }
        missing.reverse();

        let mut created = Vec::with_capacity(missing.len());
        for dir in missing {
            match fs::create_dir(&dir) {
                Ok(()) => {
                    debug!("Created directory {}", dir.display());
                    created.push(dir);
                }
                // Someone else made it between the probe and now
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(EditError::io(dir, e)),
            }
        }
        Ok(created)
    }

    async fn delete_file(&self, path: &Path) -> Result<(), EditError> {
        let normalized = normalize_path(path);
        retry_operation(|| fs::remove_file(&normalized).map_err(|e| EditError::io(&normalized, e)))
            .await
    }

    async fn remove_directories(&self, dirs: &[PathBuf]) {
        for dir in dirs.iter().rev() {
            match fs::remove_dir(dir) {
                Ok(()) => debug!("Removed directory {}", dir.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("Directory {} already gone", dir.display())
                }
                Err(e) => warn!("Could not remove directory {}: {}", dir.display(), e),
            }
        }
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> Result<(), EditError> {
        let from_norm = normalize_path(from);
        let to_norm = normalize_path(to);
        retry_operation(|| {
            fs::copy(&from_norm, &to_norm).map_err(|e| EditError::io(&from_norm, e))?;
            Ok(())
        })
        .await
    }

    async fn file_stats(&self, path: &Path) -> Result<FileStats, EditError> {
        let normalized = normalize_path(path);
        let metadata = retry_operation(|| {
            fs::metadata(&normalized).map_err(|e| EditError::io(&normalized, e))
        })
        .await?;
        Ok(FileStats {
            size: metadata.len(),
            is_file: metadata.is_file(),
            is_dir: metadata.is_dir(),
            modified: metadata.modified().ok(),
        })
    }
}
