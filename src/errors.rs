use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("SOURCE_UNAVAILABLE: {0}")]
    SourceUnavailable(String),
    #[error("QUERY_FAILED: {0}")]
    Query(String),
    #[error("LINT_FAILED: {0}")]
    Lint(String),
    #[error("PARSE_FAILED: {0}")]
    Parse(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    /// Human readable message without the code prefix, used for host notifications.
    pub fn message(&self) -> String {
        match self {
            Self::SourceUnavailable(message)
            | Self::Query(message)
            | Self::Lint(message)
            | Self::Parse(message)
            | Self::Io(message)
            | Self::Internal(message) => message.clone(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
