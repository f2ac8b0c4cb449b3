pub mod editor;
pub mod settings;

pub use editor::ConfigEditor;
pub use settings::{ReplacementEntry, RestoreStrategy, Settings};
