//! Streaming diff-edit coordination: show a proposed file edit as a live
//! comparison view, stream content into it, then commit or revert it.

pub mod config;
pub mod context;
pub mod error;
pub mod fs;
pub mod integrations;
pub mod text;

pub use config::{Config, SharedConfig};
pub use context::{EditSettings, SessionContext, SettingsSource};
pub use error::{EditError, HostError};
pub use integrations::editor::{DiffViewProvider, EditKind, SaveResult};

#[cfg(test)]
mod tests;
