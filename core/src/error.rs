use std::path::PathBuf;

use thiserror::Error;

/// Cosigner error types
#[derive(Error, Debug)]
pub enum SignerError {
    /// Secret root could not be enumerated
    #[error("Secret discovery failed for {}: {message}", path.display())]
    Discovery { path: PathBuf, message: String },

    /// A secret directory has no key file
    #[error("Secret {secret} has no key file at {}", key_path.display())]
    MissingKey { secret: String, key_path: PathBuf },

    /// Password file present but unreadable
    #[error("Failed to read key password {}: {message}", path.display())]
    Password { path: PathBuf, message: String },

    /// Signing with one key failed
    #[error("unable to sign image with {}: {message}", key_path.display())]
    Sign { key_path: PathBuf, message: String },

    /// Export report carries no tags to sign
    #[error("Export report contains no image tags")]
    EmptyReport,

    /// Export report could not be read or parsed
    #[error("Export report error: {0}")]
    Report(String),

    /// The external sign capability failed
    #[error("{0}")]
    Capability(String),

    /// Image reference could not be parsed
    #[error("Invalid image reference: {0}")]
    Reference(String),

    /// Lifecycle image reconciliation error
    #[error("{0}")]
    Lifecycle(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for SignerError {
    fn from(err: serde_json::Error) -> Self {
        SignerError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for SignerError {
    fn from(err: serde_yaml::Error) -> Self {
        SignerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for SignerError {
    fn from(err: toml::de::Error) -> Self {
        SignerError::Report(err.to_string())
    }
}

/// Result type alias for cosigner operations
pub type Result<T> = std::result::Result<T, SignerError>;
