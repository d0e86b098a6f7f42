use thiserror::Error;

/// Fatal errors. Field-level problems never end up here; they are recorded
/// as diagnostics and the run carries on.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid {what}: {reason}")]
    InvalidInput { what: String, reason: String },
}

impl DirectoryError {
    pub fn invalid_input(what: impl Into<String>, reason: impl Into<String>) -> Self {
        DirectoryError::InvalidInput {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
