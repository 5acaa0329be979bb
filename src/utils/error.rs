use crate::core::ephemeris::{FIRST_VALID_YEAR, LAST_VALID_YEAR};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AspectError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Ephemeris error: {message}")]
    EphemerisError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("git {command} failed (exit code {exit_code}): {stderr}")]
    GitCommandError {
        command: String,
        exit_code: i32,
        stderr: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Computation,
    Storage,
    Publishing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl AspectError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AspectError::ConfigError { .. }
            | AspectError::ConfigValidationError { .. }
            | AspectError::MissingConfigError { .. }
            | AspectError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            AspectError::EphemerisError { .. } | AspectError::ProcessingError { .. } => {
                ErrorCategory::Computation
            }
            AspectError::IoError(_)
            | AspectError::SerializationError(_)
            | AspectError::CsvError(_) => ErrorCategory::Storage,
            AspectError::GitCommandError { .. } => ErrorCategory::Publishing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Computation => ErrorSeverity::High,
            // push 失敗通常是暫時性的，下一次排程會再推
            ErrorCategory::Publishing => ErrorSeverity::Medium,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            AspectError::ConfigError { .. } | AspectError::ConfigValidationError { .. } => {
                "Check the configuration file syntax and values".to_string()
            }
            AspectError::MissingConfigError { field } => {
                format!("Provide a value for '{}'", field)
            }
            AspectError::InvalidConfigValueError { field, .. } => {
                format!("Correct the value of '{}'", field)
            }
            AspectError::EphemerisError { .. } => {
                format!(
                    "Use a date between {} and {} covered by the ephemeris",
                    FIRST_VALID_YEAR, LAST_VALID_YEAR
                )
            }
            AspectError::ProcessingError { .. } => {
                "Run again with --verbose to inspect the computed positions".to_string()
            }
            AspectError::IoError(_) => {
                "Check that the output directory exists and is writable".to_string()
            }
            AspectError::SerializationError(_) | AspectError::CsvError(_) => {
                "Check the output format settings".to_string()
            }
            AspectError::GitCommandError { command, .. } if command == "push" => {
                "Check the access token and that the remote branch accepts pushes".to_string()
            }
            AspectError::GitCommandError { .. } => {
                "Check that the repository path is a git work tree".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Computation => format!("Could not compute aspects: {}", self),
            ErrorCategory::Storage => format!("Could not write the report: {}", self),
            ErrorCategory::Publishing => format!("Could not publish the report: {}", self),
        }
    }

    /// Process exit code for this error, derived from its severity.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, AspectError>;
