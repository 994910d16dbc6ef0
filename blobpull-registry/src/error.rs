use std::path::PathBuf;

use reqwest::StatusCode;

/// Errors produced by the registry client.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The request never produced a response, or the body stream broke.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The registry answered with a non-success status.
    #[error("GET {url} returned {status}")]
    Status { url: String, status: StatusCode },

    /// The response body did not have the expected structure.
    #[error("unexpected response shape: {0}")]
    Shape(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid client configuration: {0}")]
    Config(String),
}

/// Coarse failure category, for callers that only need to branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Http,
    Data,
    Filesystem,
    Config,
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::Status { .. } => ErrorKind::Http,
            Self::Shape(_) => ErrorKind::Data,
            Self::Io { .. } => ErrorKind::Filesystem,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Shape(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variant() {
        let status = RegistryError::Status {
            url: "https://r/v2/x/manifests/latest".to_string(),
            status: StatusCode::NOT_FOUND,
        };
        assert_eq!(status.kind(), ErrorKind::Http);
        assert_eq!(
            RegistryError::Shape("no tags".into()).kind(),
            ErrorKind::Data
        );
        let io = RegistryError::io(
            "downloaded_blobs",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert_eq!(io.kind(), ErrorKind::Filesystem);
    }

    #[test]
    fn json_errors_are_shape_errors() {
        let err: RegistryError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Data);
    }

    #[test]
    fn status_message_names_url_and_code() {
        let err = RegistryError::Status {
            url: "https://r/v2/x/manifests/v1".to_string(),
            status: StatusCode::NOT_FOUND,
        };
        assert_eq!(
            err.to_string(),
            "GET https://r/v2/x/manifests/v1 returned 404 Not Found"
        );
    }
}
