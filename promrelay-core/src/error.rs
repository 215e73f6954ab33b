//! Crate-wide error type
//!
//! Each module has its own error enum. [`RelayError`] wraps them for callers
//! that drive several modules and only need one error type.

use thiserror::Error;

use crate::chain::ChainError;
use crate::collect::CollectError;
use crate::config::ConfigError;
use crate::exec::ExecError;
use crate::tracing::TracingError;
use crate::vault::VaultError;

/// Any promrelay error
#[derive(Debug, Error)]
pub enum RelayError {
    /// Secret vault error
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Chain building error
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Remote execution error
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Collection error
    #[error(transparent)]
    Collect(#[from] CollectError),

    /// Logging setup error
    #[error(transparent)]
    Tracing(#[from] TracingError),
}

impl RelayError {
    /// Returns true if the error comes from reaching or talking to a host
    #[must_use]
    pub const fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::Chain(_)
                | Self::Exec(_)
                | Self::Collect(
                    CollectError::Chain { .. }
                        | CollectError::Exec { .. }
                        | CollectError::RemoteFailure { .. }
                )
        )
    }
}

/// Result type using [`RelayError`]
pub type RelayResult<T> = Result<T, RelayError>;
