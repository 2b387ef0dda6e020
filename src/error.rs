//! Error types for driftfield

use thiserror::Error;

/// The main error type for field simulation and its browser glue
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Randomness source failed: {0}")]
    Entropy(#[from] rand::Error),

    #[error("Render surface error: {0}")]
    Surface(String),

    #[error("Platform error: {0}")]
    Platform(String),
}

pub type Result<T> = std::result::Result<T, FieldError>;
