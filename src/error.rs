use thiserror::Error;

/// Startup-time failures. Request handling has no error path: every request
/// ends in a [`crate::guard::Decision`].
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Invalid value {value:?} for environment variable {var}")]
    InvalidEnv { var: String, value: String },

    #[error("Failed to read config file {path}: {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GuardError>;
