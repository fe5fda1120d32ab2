//! Error handling for the meshroom CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Meshroom core error: {0}")]
    Core(#[from] meshroom_core::MeshroomError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

