//! CLI error types and exit codes.

use promrelay_core::{CollectError, ConfigError, RelayError, VaultError};

/// Exit codes for CLI operations
pub mod exit_codes {
    /// General error - configuration, validation, or other non-connection errors
    pub const GENERAL_ERROR: i32 = 1;
    /// Connection failure - a hop could not be reached or the remote command
    /// failed
    pub const CONNECTION_FAILURE: i32 = 2;
}

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Target not found
    #[error("Target not found: {0}")]
    TargetNotFound(String),

    /// Collection request error that involves no connection
    #[error("Collection error: {0}")]
    Collect(String),

    /// Secret key or encryption error
    #[error("Secret error: {0}")]
    Secret(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// HTTP server error
    #[error("Server error: {0}")]
    Server(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RelayError> for CliError {
    fn from(err: RelayError) -> Self {
        if err.is_connection_failure() {
            return Self::Connection(err.to_string());
        }
        match err {
            RelayError::Vault(e) => Self::Secret(e.to_string()),
            RelayError::Config(e) => Self::Config(e.to_string()),
            RelayError::Tracing(e) => Self::Config(e.to_string()),
            RelayError::Collect(CollectError::UnknownTarget(name)) => Self::TargetNotFound(name),
            RelayError::Collect(CollectError::Encrypt(e)) => Self::Secret(e.to_string()),
            RelayError::Collect(e) => Self::Collect(e.to_string()),
            RelayError::Chain(e) => Self::Connection(e.to_string()),
            RelayError::Exec(e) => Self::Connection(e.to_string()),
        }
    }
}

impl From<CollectError> for CliError {
    fn from(err: CollectError) -> Self {
        RelayError::from(err).into()
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        RelayError::from(err).into()
    }
}

impl From<VaultError> for CliError {
    fn from(err: VaultError) -> Self {
        RelayError::from(err).into()
    }
}

impl CliError {
    /// Returns the appropriate exit code for this error type.
    ///
    /// Exit codes:
    /// - 0: Success (not an error)
    /// - 1: General error (configuration, secrets, server, IO)
    /// - 2: Connection failure (hop unreachable, command failed, target not found)
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Connection(_) | Self::TargetNotFound(_) => exit_codes::CONNECTION_FAILURE,
            Self::Config(_) | Self::Collect(_) | Self::Secret(_) | Self::Server(_) | Self::Io(_) => {
                exit_codes::GENERAL_ERROR
            }
        }
    }
}
