use thiserror::Error;

/// The main error type for macro-profile operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Profile JSON could not be read or written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Not one of the nine numpad slots
    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    /// No template with this name is loaded
    #[error("Unknown macro template: {0}")]
    UnknownTemplate(String),

    /// Not one of Up, Down, Left, Right
    #[error("Unknown direction: {0}")]
    UnknownDirection(String),

    /// A delay or hold time that is negative or not a number
    #[error("Invalid timing: {0} ms")]
    InvalidTiming(f64),
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;
