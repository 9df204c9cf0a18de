//! Error types for getrun
//!
//! All modules use `GetrunResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for getrun operations
pub type GetrunResult<T> = Result<T, GetrunError>;

/// Exit code for invalid command-line usage
pub const EXIT_USAGE: u8 = 1;

/// Exit code when dependencies could not be resolved or retrieved
pub const EXIT_RESOLUTION: u8 = 2;

/// Exit code when the child process could not be started
pub const EXIT_LAUNCH: u8 = 3;

/// Exit code for every other failure
pub const EXIT_INTERNAL: u8 = 4;

/// All errors that can occur in getrun
#[derive(Error, Debug)]
pub enum GetrunError {
    // Usage errors
    #[error("invalid cmd")]
    Usage,

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // Resolution errors
    #[error("Dependencies not found for {coordinate} ({} problem(s))", .problems.len())]
    Resolution {
        coordinate: String,
        problems: Vec<String>,
    },

    #[error("Repository {url} failed: {reason}")]
    Repository { url: String, reason: String },

    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Cache directory holds {cached}, but {requested} was requested")]
    CacheMismatch { cached: String, requested: String },

    // Process errors
    #[error("Failed to launch: {command}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stop child process: {0}")]
    Supervision(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GetrunError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a launch error
    pub fn launch(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::Launch {
            command: command.into(),
            source,
        }
    }

    /// Problem lines to show the operator, one per unresolved node
    pub fn problems(&self) -> &[String] {
        match self {
            Self::Resolution { problems, .. } => problems,
            _ => &[],
        }
    }

    /// Process exit code this error maps to
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Usage => EXIT_USAGE,
            Self::InvalidCoordinate(_)
            | Self::Resolution { .. }
            | Self::Repository { .. }
            | Self::ChecksumMismatch { .. }
            | Self::CacheMismatch { .. } => EXIT_RESOLUTION,
            Self::Launch { .. } => EXIT_LAUNCH,
            _ => EXIT_INTERNAL,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::CacheMismatch { .. } => {
                Some("Run again with --refresh, or remove the cache directory")
            }
            Self::Launch { .. } => Some("Set JAVA_HOME or [launch] java in the config file"),
            _ => None,
        }
    }
}
