use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Conflict,
    Unavailable,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("slot number {0} is outside 1..=42")]
    InvalidSlotNumber(u8),
    #[error("microscope {0} does not exist; expected 1 or 2")]
    InvalidMicroscope(u8),
    #[error("unknown sample status '{0}'")]
    UnknownStatus(String),
    #[error("unknown well plate type '{0}'")]
    UnknownWellPlateType(String),
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        Self::new(ErrorCode::Validation, value.to_string())
    }
}
