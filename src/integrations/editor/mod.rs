//! The diff-edit engine: comparison views, streaming, save and revert.

pub mod decoration_controller;
pub mod diff_view;
pub mod diff_view_provider;
pub mod direct_save;
pub mod effects;
pub mod operations;
pub mod session;
pub mod streaming;
pub mod write_result;

pub use decoration_controller::{DecorationController, DecorationFactory, DecorationType};
pub use diff_view::{DIFF_EDITOR_OPEN_TIMEOUT, DiffViewManager, DiffViewState};
pub use diff_view_provider::DiffViewProvider;
pub use direct_save::{ContentWarning, DirectSaveOptions, DirectSaveOutcome};
pub use effects::{DecoratedEffects, EditorEffects, NoEffects};
pub use operations::ValidationResult;
pub use session::{EditKind, EditSession, ProviderState, SaveResult};
pub use streaming::StreamProgress;
pub use write_result::ToolWriteResult;
