//! Forecast-specific error types.

use onacc_core::NetworkError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure class recorded for a locality in a run outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidConfig,
    NetworkError,
    ApiError,
    SchemaError,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidConfig => "InvalidConfig",
            Self::NetworkError => "NetworkError",
            Self::ApiError => "ApiError",
            Self::SchemaError => "SchemaError",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected response shape: {0}")]
    Schema(String),

    #[error("Cancelled before completion")]
    Cancelled,
}

impl ForecastError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::Network(_) => ErrorKind::NetworkError,
            Self::Api { .. } => ErrorKind::ApiError,
            Self::Schema(_) => ErrorKind::SchemaError,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Only transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// User-friendly error message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidConfig(msg) => format!("Invalid forecast settings: {}", msg),
            Self::Network(e) => e.user_message().to_string(),
            Self::Api { status, .. } if *status >= 500 => {
                "The forecast service is unavailable. Please try again later.".to_string()
            }
            Self::Api { status, .. } => {
                format!("The forecast service rejected the request ({})", status)
            }
            Self::Schema(_) => {
                "The forecast service returned data in an unexpected format.".to_string()
            }
            Self::Cancelled => "The forecast run was cancelled.".to_string(),
        }
    }
}

/// Locality file import errors.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Malformed locality file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unreadable spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("Cannot read locality file: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    /// Import problems are configuration problems from the pipeline's point of view.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidConfig
    }
}

/// Errors that stop a run before any locality is attempted.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No localities selected")]
    NoLocalities,
}

/// Export and re-import errors.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Delimited text error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Export I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot write workbook: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("Cannot read workbook: {0}")]
    Spreadsheet(String),

    #[error("Line {line}: {message}")]
    Parse { line: u64, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            ForecastError::InvalidConfig("x".into()).kind(),
            ErrorKind::InvalidConfig
        );
        assert_eq!(
            ForecastError::Network(NetworkError::Timeout).kind(),
            ErrorKind::NetworkError
        );
        assert_eq!(
            ForecastError::Api {
                status: 400,
                body: String::new()
            }
            .kind(),
            ErrorKind::ApiError
        );
        assert_eq!(ForecastError::Schema("x".into()).kind(), ErrorKind::SchemaError);
        assert_eq!(ForecastError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_is_retryable() {
        assert!(ForecastError::Network(NetworkError::Timeout).is_retryable());
        assert!(!ForecastError::Schema("missing daily".into()).is_retryable());
        assert!(!ForecastError::Api {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!ForecastError::Cancelled.is_retryable());
    }

    #[test]
    fn test_api_error_display_carries_status_and_body() {
        let err = ForecastError::Api {
            status: 400,
            body: r#"{"error":true,"reason":"Latitude must be in range"}"#.into(),
        };
        let text = err.to_string();
        assert!(text.contains("400"));
        assert!(text.contains("Latitude must be in range"));
        assert!(err.user_message().contains("400"));
    }

    #[test]
    fn test_import_error_lists_columns() {
        let err = ImportError::MissingColumns(vec!["altitude".into(), "country".into()]);
        assert_eq!(err.to_string(), "Missing required column(s): altitude, country");
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ErrorKind::NetworkError.to_string(), "NetworkError");
        assert_eq!(ErrorKind::Cancelled.as_str(), "Cancelled");
    }
}
