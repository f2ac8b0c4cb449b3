use thiserror::Error;

#[derive(Error, Debug)]
pub enum DepshiftError {
    #[error("Project validation failed: {0}")]
    ProjectValidation(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Install command failed: {0}")]
    Install(String),

    #[error("Git operation failed: {0}")]
    GitOperation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Registry request failed: {0}")]
    Registry(String),

    #[error("Operation cancelled by user")]
    UserCancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DepshiftError>;
