use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Io,
    Validation,
    Empty,
}

/// Failures raised by hosts while assembling a raffle. The controller itself
/// never fails.
#[derive(Debug, Error)]
pub enum RaffleError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid settings in {origin}: {message}")]
    InvalidSettings { origin: String, message: String },
    #[error("no participants supplied")]
    NoParticipants,
}

impl RaffleError {
    pub fn invalid_settings(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSettings {
            origin: origin.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Io { .. } => ErrorCode::Io,
            Self::InvalidSettings { .. } => ErrorCode::Validation,
            Self::NoParticipants => ErrorCode::Empty,
        }
    }
}
