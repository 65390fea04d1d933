use std::path::PathBuf;
use thiserror::Error;

/// Core error type for modex operations.
///
/// The `Display` text is what the extension receives in a failed response's
/// `error` field.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read registry at {path}: {source}")]
    RegistryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse registry at {path}: {source}")]
    RegistryParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Environment already exists at {path}")]
    AlreadyExists { path: PathBuf },

    #[error("Invalid environment path: {path:?}")]
    InvalidPath { path: String },

    #[error("No active virtual environment")]
    NoActiveEnvironment,

    #[error("Environment not found: {id}")]
    EnvironmentNotFound { id: u64 },

    #[error("Invalid {what}: {value:?}")]
    InvalidName { what: &'static str, value: String },

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The collaborator exited non-zero; the message is its stderr verbatim.
    #[error("{stderr}")]
    ToolFailed {
        program: PathBuf,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Invalid output from {program}: {reason}")]
    InvalidOutput { program: PathBuf, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    #[must_use]
    pub fn invalid_name(what: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidName {
            what,
            value: value.into(),
        }
    }
}
