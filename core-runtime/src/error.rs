//! Runtime error type shared by configuration and logging setup.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value or log filter
    #[error("Configuration error: {0}")]
    Config(String),

    /// A host bridge the requested operation depends on was not provided
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Logging already initialized: {0}")]
    LoggingInitialized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn capability_missing(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Error::CapabilityMissing {
            capability: capability.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the error is fixed by wiring another host bridge.
    pub fn is_capability_missing(&self) -> bool {
        matches!(self, Error::CapabilityMissing { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
