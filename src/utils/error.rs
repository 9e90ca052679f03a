use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Price source error for {symbol}: {message}")]
    SourceError { symbol: String, message: String },

    #[error("Insufficient data: {message}")]
    InsufficientData { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Data,
    Storage,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AnalysisError {
    pub fn insufficient(message: impl Into<String>) -> Self {
        Self::InsufficientData {
            message: message.into(),
        }
    }

    pub fn source_error(symbol: &str, message: impl Into<String>) -> Self {
        Self::SourceError {
            symbol: symbol.to_string(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApiError(_) | Self::SourceError { .. } => ErrorCategory::Network,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::CsvError(_) | Self::InsufficientData { .. } => ErrorCategory::Data,
            Self::IoError(_) | Self::ZipError(_) => ErrorCategory::Storage,
            Self::SerializationError(_) | Self::ProcessingError { .. } => {
                ErrorCategory::Processing
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 網路錯誤通常重試即可
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::ApiError(_) | Self::SourceError { .. } => {
                "Check network connectivity and that the price endpoint is reachable, then retry"
            }
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => {
                "Review the command line flags or TOML configuration file"
            }
            Self::InsufficientData { .. } => {
                "Use a longer window or symbols with overlapping trading days"
            }
            Self::CsvError(_) => "Make sure price files have 'date' and 'close' columns",
            Self::IoError(_) | Self::ZipError(_) => {
                "Check that the output directory exists and is writable"
            }
            Self::SerializationError(_) | Self::ProcessingError { .. } => {
                "Run again with --verbose and inspect the logs"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ApiError(_) => "Could not download market data".to_string(),
            Self::SourceError { symbol, .. } => format!("No usable prices for {}", symbol),
            Self::InsufficientData { message } => format!("Not enough data to analyze: {}", message),
            Self::MissingConfigError { field } => format!("Missing setting: {}", field),
            Self::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting {}: {}", field, reason)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_errors_are_retryable() {
        let err = AnalysisError::source_error("EURUSD=X", "HTTP 503");
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.user_friendly_message().contains("EURUSD=X"));
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = AnalysisError::MissingConfigError {
            field: "source.data_dir".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.user_friendly_message(), "Missing setting: source.data_dir");
    }

    #[test]
    fn test_insufficient_data_message() {
        let err = AnalysisError::insufficient("no symbol returned prices");
        assert_eq!(err.category(), ErrorCategory::Data);
        assert_eq!(err.to_string(), "Insufficient data: no symbol returned prices");
    }
}
