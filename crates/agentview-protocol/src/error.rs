use std::fmt;

/// Result type for agentview-protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while decoding the frame stream
#[derive(Debug)]
pub enum Error {
    /// Frame payload is not valid JSON
    Json(serde_json::Error),

    /// Line bytes are not valid UTF-8
    Utf8(std::str::Utf8Error),

    /// Well-formed JSON that is not a recognized frame shape
    Unrecognized(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Json(err) => write!(f, "JSON error: {}", err),
            Error::Utf8(err) => write!(f, "UTF-8 error: {}", err),
            Error::Unrecognized(msg) => write!(f, "Unrecognized frame: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Json(err) => Some(err),
            Error::Utf8(err) => Some(err),
            Error::Unrecognized(_) => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error::Utf8(err)
    }
}
