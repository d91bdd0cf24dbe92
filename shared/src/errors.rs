/// Unified error types for the asset mirror.
use thiserror::Error;

/// HTTP statuses that mean the remote refused the asset or no longer has it.
pub const TERMINAL_STATUSES: [u16; 6] = [400, 403, 404, 410, 422, 503];

/// Top-level error type for setup and persistence.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a single fetch did not produce a stored asset.
///
/// The `Display` output of each variant is exactly the outcome string that
/// ends up in the checkpoint and output catalog.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Response code {code} ({reason})")]
    Status { code: u16, reason: String },

    #[error("{0}")]
    Dns(String),

    #[error("Invalid content-type {0}")]
    InvalidContentType(String),

    #[error("Invalid URL {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    Store(String),

    #[error("{0}")]
    Transport(String),
}

impl FetchError {
    /// Build a status error using the canonical reason phrase.
    pub fn status(code: u16, reason: Option<&str>) -> Self {
        FetchError::Status {
            code,
            reason: reason.unwrap_or("Unknown").to_string(),
        }
    }

    /// Whether this error is recorded immediately without another attempt.
    pub fn is_terminal(&self) -> bool {
        match self {
            FetchError::Status { code, .. } => TERMINAL_STATUSES.contains(code),
            FetchError::Dns(_)
            | FetchError::InvalidContentType(_)
            | FetchError::InvalidUrl(_)
            | FetchError::Store(_) => true,
            FetchError::Transport(_) => false,
        }
    }
}

/// Result type alias for mirror operations.
pub type MirrorResult<T> = Result<T, MirrorError>;
