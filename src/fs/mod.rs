pub mod operations;

pub use operations::{
    display_relative, normalize_path, paths_equal, resolve_absolute_path, FileStats, FileSystem,
    LocalFileSystem,
};

#[cfg(test)]
pub use operations::MockFileSystem;
