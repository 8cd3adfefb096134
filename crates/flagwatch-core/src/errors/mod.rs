use std::error::Error;

use flagwatch_paths::PathError;

use crate::dispatch::HandlerError;
use crate::source::SourceError;
use crate::store::StoreError;
use crate::types::InvalidCategoryName;

/// Base trait for all flagwatch errors
pub trait FlagwatchError: Error + Send + Sync + 'static {
    /// Error code for programmatic handling
    fn error_code(&self) -> &'static str;

    /// Whether the error stems from user input rather than the environment
    fn is_user_error(&self) -> bool {
        false
    }
}

/// Common result type for the application
pub type FlagwatchResult<T> = Result<T, Box<dyn FlagwatchError>>;

impl FlagwatchError for flagwatch_config::ConfigError {
    fn error_code(&self) -> &'static str {
        flagwatch_config::ConfigError::error_code(self)
    }

    fn is_user_error(&self) -> bool {
        flagwatch_config::ConfigError::is_user_error(self)
    }
}

impl FlagwatchError for PathError {
    fn error_code(&self) -> &'static str {
        match self {
            PathError::HomeNotFound => "HOME_NOT_FOUND",
        }
    }
}

impl FlagwatchError for InvalidCategoryName {
    fn error_code(&self) -> &'static str {
        "INVALID_CATEGORY"
    }

    fn is_user_error(&self) -> bool {
        true
    }
}

impl FlagwatchError for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            StoreError::IoError { .. } => "STORE_IO_ERROR",
            StoreError::SerializationError { .. } => "STORE_SERIALIZATION_ERROR",
        }
    }
}

impl FlagwatchError for SourceError {
    fn error_code(&self) -> &'static str {
        match self {
            SourceError::InvalidEndpoint { .. } => "INVALID_ENDPOINT",
            SourceError::Connection(_) => "SOURCE_CONNECTION_FAILED",
            SourceError::Timeout => "SOURCE_TIMEOUT",
            SourceError::Status { .. } => "SOURCE_BAD_STATUS",
            SourceError::InvalidResponse(_) => "SOURCE_INVALID_RESPONSE",
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(self, SourceError::InvalidEndpoint { .. })
    }
}

impl FlagwatchError for HandlerError {
    fn error_code(&self) -> &'static str {
        match self {
            HandlerError::Failed(_) => "HANDLER_FAILED",
            HandlerError::Panicked(_) => "HANDLER_PANICKED",
        }
    }
}
