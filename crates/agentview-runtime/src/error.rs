use std::fmt;

/// Result type for agentview-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the runtime layer
#[derive(Debug)]
pub enum Error {
    /// A live turn is already consuming the conversation
    TurnInProgress,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TurnInProgress => write!(f, "a turn is already in progress"),
        }
    }
}

impl std::error::Error for Error {}
