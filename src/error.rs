//! Error types for blobpull

use blobpull_registry::{ErrorKind, RegistryError};
use thiserror::Error;

/// Result type alias using blobpull Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while pulling an image's blobs
#[derive(Error, Debug)]
pub enum Error {
    /// Registry, data-shape and filesystem errors from the registry client
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Some layers failed under the keep-going policy
    #[error("{failed} of {total} layers failed to download")]
    LayerFailures { failed: usize, total: usize },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Failure category, when the error came from the registry client.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Registry(e) => Some(e.kind()),
            _ => None,
        }
    }

    /// Whether this is a transport or HTTP status failure.
    pub fn is_http(&self) -> bool {
        self.kind() == Some(ErrorKind::Http)
    }

    /// The `[!]` line printed when a run fails.
    pub fn console_line(&self) -> String {
        if self.is_http() {
            format!("[!] HTTP error occurred: {}", self)
        } else {
            format!("[!] An error occurred: {}", self)
        }
    }
}
