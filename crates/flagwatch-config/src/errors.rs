#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse config file: {message}")]
    ConfigParseError { message: String },

    #[error("Invalid category '{category}': {reason}")]
    InvalidCategory { category: String, reason: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("No status endpoint configured. Set [poller] endpoint or pass --endpoint")]
    MissingEndpoint,

    #[error("IO error reading config: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigError::ConfigParseError { .. } => "CONFIG_PARSE_ERROR",
            ConfigError::InvalidCategory { .. } => "INVALID_CATEGORY",
            ConfigError::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            ConfigError::MissingEndpoint => "MISSING_ENDPOINT",
            ConfigError::IoError { .. } => "CONFIG_IO_ERROR",
        }
    }

    pub fn is_user_error(&self) -> bool {
        !matches!(self, ConfigError::IoError { .. })
    }
}
