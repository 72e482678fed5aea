use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the finance dashboard.
///
/// Every variant is fatal for the operation that produced it. Row-level
/// problems during an import are not errors; they are repaired in place and
/// reported as warnings by the normalizer.
#[derive(Error, Debug)]
pub enum DashError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file extension is not one of the accepted import formats.
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(PathBuf),

    /// The CSV or spreadsheet parser rejected the file contents.
    #[error("Error processing file: {0}")]
    Parse(String),

    /// The file parsed but contained no data rows.
    #[error("No data found in the file")]
    NoData,

    /// The header row lacks one or more of the required columns.
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// The remote table store returned an error object.
    #[error("Data store error: {0}")]
    Store(String),

    /// The identity provider rejected a request.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The operation requires a signed-in user.
    #[error("{0}")]
    NotSignedIn(String),

    /// A single-row lookup matched nothing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A file read or remote call exceeded its time budget.
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// The caller cancelled the operation.
    #[error("{0} was cancelled")]
    Cancelled(String),

    /// An import was requested while another one is still in flight.
    #[error("Another import is already in progress")]
    Busy,

    /// The chart renderer could not create a chart instance.
    #[error("Chart rendering failed: {0}")]
    Render(String),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the dashboard crates.
pub type Result<T> = std::result::Result<T, DashError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = DashError::FileRead {
            path: PathBuf::from("/uploads/march.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/uploads/march.csv"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_missing_columns_names_every_field() {
        let err = DashError::MissingColumns(vec!["category".to_string(), "amount".to_string()]);
        assert_eq!(err.to_string(), "Missing required columns: category, amount");
    }

    #[test]
    fn test_error_display_missing_single_column() {
        let err = DashError::MissingColumns(vec!["amount".to_string()]);
        assert_eq!(err.to_string(), "Missing required columns: amount");
    }

    #[test]
    fn test_error_display_no_data() {
        assert_eq!(DashError::NoData.to_string(), "No data found in the file");
    }

    #[test]
    fn test_error_display_timeout() {
        let err = DashError::Timeout {
            operation: "insert into transactions".to_string(),
            secs: 30,
        };
        assert_eq!(err.to_string(), "insert into transactions timed out after 30s");
    }

    #[test]
    fn test_error_display_not_signed_in_is_verbatim() {
        let err = DashError::NotSignedIn("Please login to comment".to_string());
        assert_eq!(err.to_string(), "Please login to comment");
    }

    #[test]
    fn test_error_display_busy() {
        assert_eq!(
            DashError::Busy.to_string(),
            "Another import is already in progress"
        );
    }

    #[test]
    fn test_error_display_unsupported_format() {
        let err = DashError::UnsupportedFormat(PathBuf::from("notes.txt"));
        assert_eq!(err.to_string(), "Unsupported file type: notes.txt");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: DashError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: DashError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
