//! Error types for vmext-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using vmext-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds raised by the extension handler framework.
///
/// Each protocol violation has its own variant so callers and tests can
/// assert on the specific cause rather than on message text.
#[derive(Error, Debug)]
pub enum Error {
    /// Extension name was empty at construction
    #[error("extension name cannot be empty")]
    EmptyName,

    /// Extension version was empty at construction
    #[error("extension version cannot be empty")]
    EmptyVersion,

    /// No enable callback was supplied at construction
    #[error("an enable callback is required")]
    MissingEnableCallback,

    /// HandlerEnvironment.json (or its registry equivalent) could not be located
    #[error("handler environment not found: {location}")]
    HandlerEnvironmentNotFound { location: String },

    /// Handler environment was found but could not be used
    #[error("invalid handler environment: {message}")]
    InvalidHandlerEnvironment { message: String },

    /// The config folder holds no `.settings` files
    #[error("no settings files found in {folder}")]
    NoSettingsFiles { folder: PathBuf },

    /// A `.settings` file name does not carry a numeric stem
    #[error("invalid settings file name: {name}")]
    InvalidSettingsFileName { name: String },

    /// The settings file could not be read or parsed
    #[error("invalid settings file {path}: {reason}")]
    InvalidSettingsFile { path: PathBuf, reason: String },

    /// The settings envelope did not hold exactly one runtime settings container
    #[error("wrong runtimeSettings count. expected:1, got:{count}")]
    InvalidRuntimeSettingsCount { count: usize },

    /// Protected settings were supplied without a certificate thumbprint
    #[error("protected settings are present but no certificate thumbprint was supplied")]
    NoCertificateThumbprint,

    /// A certificate thumbprint was supplied without protected settings
    #[error("a certificate thumbprint is present but no protected settings were supplied")]
    MissingProtectedSettings,

    /// Protected settings were not valid base64
    #[error("protected settings are not valid base64 data")]
    InvalidProtectedSettingsData,

    /// The decryption collaborator failed
    #[error("failed to decrypt protected settings: {message}")]
    Decryption { message: String },

    /// A persisted sequence number could not be parsed
    #[error("invalid sequence number: '{value}'")]
    InvalidSequenceNumber { value: String },

    /// Unknown operation name on the command line
    #[error("invalid operation: '{name}'")]
    InvalidOperation { name: String },

    /// Registry access failed
    #[error("registry error: {message}")]
    Registry { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Error {
    /// Create a handler environment not found error
    pub fn handler_environment_not_found(location: impl Into<String>) -> Self {
        Self::HandlerEnvironmentNotFound {
            location: location.into(),
        }
    }

    /// Create an invalid handler environment error
    pub fn invalid_handler_environment(message: impl Into<String>) -> Self {
        Self::InvalidHandlerEnvironment {
            message: message.into(),
        }
    }

    /// Create an invalid settings file name error
    pub fn invalid_settings_file_name(name: impl Into<String>) -> Self {
        Self::InvalidSettingsFileName { name: name.into() }
    }

    /// Create an invalid settings file error
    pub fn invalid_settings_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidSettingsFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a decryption error
    pub fn decryption(message: impl Into<String>) -> Self {
        Self::Decryption {
            message: message.into(),
        }
    }

    /// Create an invalid sequence number error
    pub fn invalid_sequence_number(value: impl Into<String>) -> Self {
        Self::InvalidSequenceNumber {
            value: value.into(),
        }
    }

    /// Create an invalid operation error
    pub fn invalid_operation(name: impl Into<String>) -> Self {
        Self::InvalidOperation { name: name.into() }
    }

    /// Create a registry error
    pub fn registry(message: impl Into<String>) -> Self {
        Self::Registry {
            message: message.into(),
        }
    }

    /// True for the "file or key does not exist" class of IO failures
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}
