//! Error types for sink writes

use std::fmt;

/// Result type alias for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Errors that can occur while writing a reading to a durable sink
#[derive(Debug)]
pub enum SinkError {
    /// File access failed (CSV log)
    Io(std::io::Error),

    /// Row serialization failed (CSV log)
    Csv(csv::Error),

    /// HTTP transport failed (InfluxDB)
    Http(reqwest::Error),

    /// The sink endpoint rejected the write
    Rejected(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Io(err) => write!(f, "I/O error: {}", err),
            SinkError::Csv(err) => write!(f, "CSV write error: {}", err),
            SinkError::Http(err) => write!(f, "HTTP request failed: {}", err),
            SinkError::Rejected(msg) => write!(f, "sink rejected write: {}", msg),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Io(err) => Some(err),
            SinkError::Csv(err) => Some(err),
            SinkError::Http(err) => Some(err),
            SinkError::Rejected(_) => None,
        }
    }
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::Io(err)
    }
}

impl From<csv::Error> for SinkError {
    fn from(err: csv::Error) -> Self {
        SinkError::Csv(err)
    }
}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        SinkError::Http(err)
    }
}
