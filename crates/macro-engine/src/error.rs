use thiserror::Error;

/// The main error type for macro-engine operations
#[derive(Error, Debug)]
pub enum Error {
    /// Error parsing or validating a key combination
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Error registering or unregistering a hook with the OS
    #[error("Hotkey error: {0}")]
    HotkeyOperation(String),

    /// Simulated key press or release failed
    #[error("Key injection failed: {0}")]
    Inject(String),

    /// Interactive key capture failed
    #[error("Key capture failed: {0}")]
    Capture(String),

    /// The hotkey is already bound by another macro
    #[error("Hotkey '{0}' already in use.")]
    DuplicateHotkey(String),

    /// A macro index outside the current record set
    #[error("Invalid macro index: {0}")]
    InvalidIndex(usize),

    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl From<global_hotkey::Error> for Error {
    fn from(err: global_hotkey::Error) -> Self {
        Error::HotkeyOperation(err.to_string())
    }
}

impl From<enigo::InputError> for Error {
    fn from(err: enigo::InputError) -> Self {
        Error::Inject(err.to_string())
    }
}

impl From<enigo::NewConError> for Error {
    fn from(err: enigo::NewConError) -> Self {
        Error::Inject(err.to_string())
    }
}
