use thiserror::Error;

/// Top-level error type for the partner-intel workspace.
///
/// Subsystem crates define their own error types; this one covers the
/// concerns every crate shares: configuration, secrets, validation of
/// user-supplied input, and I/O.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IntelError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing secret: set {0} in the environment or the [secrets] config section")]
    MissingSecret(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for IntelError {
    fn from(err: toml::de::Error) -> Self {
        IntelError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for IntelError {
    fn from(err: toml::ser::Error) -> Self {
        IntelError::Config(err.to_string())
    }
}

/// A specialized `Result` type for partner-intel operations.
pub type Result<T> = std::result::Result<T, IntelError>;
