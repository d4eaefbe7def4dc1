//! Error types for Ember

use thiserror::Error;

/// The main error type for Ember operations
#[derive(Debug, Error)]
pub enum EmberError {
    #[error("Duplicate registration: {0}")]
    DuplicateRegistration(String),

    #[error("Class not found: {0}")]
    ClassNotFound(String),

    #[error("Type not found: {0}")]
    TypeNotFound(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Field type mismatch: {field} expects {expected}, got {got}")]
    FieldTypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("Clone of {class} failed at field {field}: {reason}")]
    CloneFailure {
        class: String,
        field: String,
        reason: String,
    },

    #[error("Registry has been shut down")]
    RegistryShutDown,

    #[error("Archive format error: {0}")]
    ArchiveFormat(String),

    #[error("Archive version {found} is not supported (up to {supported})")]
    ArchiveVersionMismatch { found: u32, supported: u32 },

    #[error("Archive corrupt: {0}")]
    ArchiveCorrupt(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),
}

/// Result type alias for Ember operations
pub type Result<T> = std::result::Result<T, EmberError>;

impl From<toml::de::Error> for EmberError {
    fn from(err: toml::de::Error) -> Self {
        EmberError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for EmberError {
    fn from(err: toml::ser::Error) -> Self {
        EmberError::TomlSerError(err.to_string())
    }
}
