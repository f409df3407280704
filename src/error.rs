/// Error types for the searchy library
use std::fmt;
use std::io;

/// Result type alias for search pipeline operations
pub type Result<T> = std::result::Result<T, SearchError>;

/// Main error type for search pipeline operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// Pattern failed to compile as a regular expression
    BadPattern(String),

    /// I/O errors (open/read/mmap)
    Io(String),

    /// Input path does not exist or is not a regular file
    NotFound(String),

    /// The pipeline was cancelled cooperatively
    Cancelled,

    /// Invariant violation inside the pipeline
    Internal(String),
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::BadPattern(msg) => write!(f, "Invalid pattern: {}", msg),
            SearchError::Io(msg) => write!(f, "I/O error: {}", msg),
            SearchError::NotFound(path) => write!(f, "No such file: {}", path),
            SearchError::Cancelled => write!(f, "Cancelled"),
            SearchError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for SearchError {}

impl From<io::Error> for SearchError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            SearchError::NotFound(err.to_string())
        } else {
            SearchError::Io(err.to_string())
        }
    }
}

impl From<regex::Error> for SearchError {
    fn from(err: regex::Error) -> Self {
        SearchError::BadPattern(err.to_string())
    }
}
