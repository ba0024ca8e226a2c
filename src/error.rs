//! Error types for guestlab.
//!
//! Uses thiserror for the variants and classifies each one so callers can
//! tell an authoritative answer from the backend apart from a failure to
//! reach it.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Resource errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Masked id conflict: token {token} is bound to {existing}, not {requested}")]
    MappingConflict {
        token: String,
        existing: String,
        requested: String,
    },

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    // Backend errors
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Backend error {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    // Local state
    #[error("Store error: {0}")]
    Store(#[from] guestlab_kv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::MappingConflict { .. } => "MAPPING_CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NotReady(_) => "NOT_READY",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Backend { .. } => "BACKEND_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Store(_) => "STORE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Inconclusive failures: the backend could not be asked, or did not
    /// give a usable answer. Local state must survive these.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Backend { .. } | Self::Decode(_)
        )
    }

    /// The backend definitively said the resource does not exist.
    pub fn is_authoritative(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Errors meant to be shown to the user as-is.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidInput(_) | Self::NotReady(_)
        )
    }
}

// Convenience conversions
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(format!("JSON parsing error: {}", err))
    }
}
