pub mod batch_executor;
pub mod error_classifier;
pub mod install_execution;
pub mod interaction;
pub mod manifest;
pub mod project_scanner;
pub mod restore;
pub mod update_orchestrator;
pub mod version_control;

pub use batch_executor::BatchExecutor;
pub use install_execution::CommandInstaller;
pub use interaction::BatchInteraction;
pub use manifest::Manifest;
pub use project_scanner::ProjectScannerAgent;
pub use restore::{GitRestorer, ManifestRestorer, SnapshotRestorer};
pub use update_orchestrator::{
    AnalysisResult, BatchGate, Collaborators, PipelineResult, UpdateOrchestrator,
};
pub use version_control::VersionControlAgent;
