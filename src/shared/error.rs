use serde::Serialize;
use thiserror::Error;

use super::types::CapabilityKind;

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(CapabilityKind),

    #[error("Unsupported language pair: {0} -> {1}")]
    UnsupportedPair(String, String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Capability Error: {0}")]
    Capability(String),

    #[error("Persistence Error: {0}")]
    Persistence(String),

    #[error("Validation Error: {0}")]
    Validation(String),

    #[error("I/O Error: {0}")]
    Io(String),

    #[error("Network Error: {0}")]
    Network(String),
}

impl AppError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }

    /// Unavailable capabilities and unsupported pairs end the action quietly.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            AppError::CapabilityUnavailable(_) | AppError::UnsupportedPair(..)
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Persistence(format!("Serialization error: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;
