use thiserror::Error;

/// Top-level error type for the Vaultflow system.
///
/// Subsystem crates define their own error types and wrap this one with
/// `#[from]` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VaultflowError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown folder: {0}")]
    UnknownFolder(String),
}

impl From<toml::de::Error> for VaultflowError {
    fn from(err: toml::de::Error) -> Self {
        VaultflowError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for VaultflowError {
    fn from(err: toml::ser::Error) -> Self {
        VaultflowError::Config(err.to_string())
    }
}

/// A specialized `Result` type for Vaultflow operations.
pub type Result<T> = std::result::Result<T, VaultflowError>;
