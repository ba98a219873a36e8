use std::path::PathBuf;

use serde::ser::SerializeStruct;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("parse failure: {0}")]
    Parse(String),
    #[error("ocr failure: {0}")]
    Ocr(String),
    #[error("converted file {} already exists and belongs to another document", .0.display())]
    ConversionCollision(PathBuf),
    #[error("translation failed: {0}")]
    Translation(String),
    #[error("provider rate limited")]
    ProviderRateLimited,
    #[error("provider timeout")]
    ProviderTimeout,
    #[error("provider invalid response: {0}")]
    ProviderInvalidResponse(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("worker crashed: {0}")]
    WorkerCrashed(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AppError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Io(_) => "IO_ERROR",
            Self::Parse(_) => "PARSE_FAILURE",
            Self::Ocr(_) => "OCR_FAILURE",
            Self::ConversionCollision(_) => "CONVERSION_COLLISION",
            Self::Translation(_) => "TRANSLATION_FAILURE",
            Self::ProviderRateLimited => "PROVIDER_RATE_LIMITED",
            Self::ProviderTimeout => "PROVIDER_TIMEOUT",
            Self::ProviderInvalidResponse(_) => "PROVIDER_INVALID_RESPONSE",
            Self::Network(_) => "NETWORK_ERROR",
            Self::WorkerCrashed(_) => "WORKER_CRASHED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Nothing retries today; the flag is carried in reports so a caller can.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderRateLimited | Self::ProviderTimeout | Self::Network(_)
        )
    }

    pub fn is_translation_failure(&self) -> bool {
        matches!(
            self,
            Self::Translation(_)
                | Self::ProviderRateLimited
                | Self::ProviderTimeout
                | Self::ProviderInvalidResponse(_)
                | Self::Network(_)
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidInput(value.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(value: csv::Error) -> Self {
        Self::Io(format!("csv write failed: {value}"))
    }
}

pub type AppResult<T> = Result<T, AppError>;
