use thiserror::Error;

/// Failure of a single page or resource fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("invalid page number {0}, pages start at 1")]
    InvalidPage(u32),
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Failure while resolving a character reference or an image reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("decode failed: {0}")]
    Decode(String),
}

impl From<FetchError> for ResolveError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Transport(cause) => ResolveError::Transport(cause),
            FetchError::Status(code) => ResolveError::Status(code),
            FetchError::Decode(cause) => ResolveError::Decode(cause),
            // Only the episode endpoint takes a page number.
            FetchError::InvalidPage(page) => {
                ResolveError::Decode(format!("unexpected page argument {page}"))
            }
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Status(status.as_u16()),
            None => FetchError::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}
