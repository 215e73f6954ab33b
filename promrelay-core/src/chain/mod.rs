//! Multi-hop connection chains
//!
//! A chain is built by folding over a target's route: hop 0 is dialled
//! directly, and every following hop is dialled through a tunnel opened on the
//! previous hop's transport. The last transport in the chain is the one
//! commands run on.
//!
//! Transports are always torn down innermost first. [`Chain::release`] does
//! this explicitly; dropping a chain that still holds transports schedules the
//! same reverse-order teardown on the current tokio runtime.

pub mod ssh;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::exec::{CapturedOutput, ExecError};
use crate::models::Hop;

pub use ssh::{SshConnector, SshTransport};

/// Errors that can occur while building a chain
///
/// Every variant except `EmptyRoute` carries the zero-based index of the hop
/// that failed.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The private key file could not be read
    #[error("hop {hop}: cannot read private key '{path}': {source}")]
    KeyFileRead {
        /// Hop index
        hop: usize,
        /// Key file path
        path: String,
        /// I/O error
        #[source]
        source: std::io::Error,
    },

    /// The private key could not be parsed
    #[error("hop {hop}: cannot parse private key '{path}': {reason}")]
    KeyParse {
        /// Hop index
        hop: usize,
        /// Key file path
        path: String,
        /// Parser message
        reason: String,
    },

    /// The private key could not be decrypted with the configured passphrase
    #[error("hop {hop}: cannot decrypt private key '{path}' with the configured passphrase: {reason}")]
    Passphrase {
        /// Hop index
        hop: usize,
        /// Key file path
        path: String,
        /// Parser message
        reason: String,
    },

    /// The transport to the hop could not be opened
    #[error("hop {hop}: cannot reach {address}: {reason}")]
    Dial {
        /// Hop index
        hop: usize,
        /// Hop address
        address: String,
        /// Failure description
        reason: String,
    },

    /// The SSH handshake failed
    #[error("hop {hop}: SSH handshake with {address} failed: {reason}")]
    Handshake {
        /// Hop index
        hop: usize,
        /// Hop address
        address: String,
        /// Failure description
        reason: String,
    },

    /// The server presented a host key that is not trusted
    #[error("hop {hop}: host key {fingerprint} of {address} is not trusted")]
    HostKeyRejected {
        /// Hop index
        hop: usize,
        /// Hop address
        address: String,
        /// Presented key fingerprint
        fingerprint: String,
    },

    /// The server rejected the credentials
    #[error("hop {hop}: {method} authentication as '{user}' on {address} failed")]
    Auth {
        /// Hop index
        hop: usize,
        /// Hop address
        address: String,
        /// Login user
        user: String,
        /// Authentication method name
        method: &'static str,
    },

    /// The route has no hops
    #[error("route has no hops")]
    EmptyRoute,
}

impl ChainError {
    /// Index of the hop that failed
    #[must_use]
    pub const fn hop_index(&self) -> Option<usize> {
        match self {
            Self::KeyFileRead { hop, .. }
            | Self::KeyParse { hop, .. }
            | Self::Passphrase { hop, .. }
            | Self::Dial { hop, .. }
            | Self::Handshake { hop, .. }
            | Self::HostKeyRejected { hop, .. }
            | Self::Auth { hop, .. } => Some(*hop),
            Self::EmptyRoute => None,
        }
    }
}

/// Result type for chain operations
pub type ChainResult<T> = Result<T, ChainError>;

/// One authenticated connection in a chain
#[async_trait]
pub trait HopTransport: Sized + Send + Sync + 'static {
    /// Runs `command` in a fresh session and captures its output
    ///
    /// The session is released before this returns, whatever the outcome.
    async fn run_command(&self, command: &str) -> Result<CapturedOutput, ExecError>;

    /// Closes the connection and waits until it has ended
    ///
    /// Errors are logged, not returned. Hops tunnelled through this one must
    /// already be closed.
    async fn close(self);
}

/// Opens hop transports, optionally tunnelled through a previous hop
#[async_trait]
pub trait HopConnector: Send + Sync {
    /// Transport produced by this connector
    type Transport: HopTransport;

    /// Connects and authenticates hop `index`
    ///
    /// `via` is the previous hop's transport, or `None` for the first hop.
    async fn connect(
        &self,
        index: usize,
        hop: &Hop,
        via: Option<&Self::Transport>,
    ) -> ChainResult<Self::Transport>;
}

/// Live transports of one request, in route order
pub struct Chain<T: HopTransport> {
    transports: Vec<T>,
}

impl<T: HopTransport> Chain<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            transports: Vec::with_capacity(capacity),
        }
    }

    /// Number of established transports
    #[must_use]
    pub fn len(&self) -> usize {
        self.transports.len()
    }

    /// Returns true if no transport is established
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }

    /// The innermost transport, where commands run
    #[must_use]
    pub fn current(&self) -> Option<&T> {
        self.transports.last()
    }

    /// Closes every transport, innermost first
    pub async fn release(mut self) {
        close_in_reverse(std::mem::take(&mut self.transports)).await;
    }
}

impl<T: HopTransport> std::fmt::Debug for Chain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("transports", &self.transports.len())
            .finish()
    }
}

impl<T: HopTransport> Drop for Chain<T> {
    fn drop(&mut self) {
        if self.transports.is_empty() {
            return;
        }

        let mut transports = std::mem::take(&mut self.transports);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(close_in_reverse(transports));
        } else {
            warn!(
                transports = transports.len(),
                "Chain dropped outside a runtime, closing without shutdown"
            );
            while transports.pop().is_some() {}
        }
    }
}

/// Each close completes before the next outer hop is touched
async fn close_in_reverse<T: HopTransport>(mut transports: Vec<T>) {
    while let Some(transport) = transports.pop() {
        transport.close().await;
        debug!(hop = transports.len(), "Hop closed");
    }
}

/// Builds a chain over `route`, connecting each hop through the previous one
///
/// On failure every transport already established is closed, innermost
/// first, before the error is returned.
///
/// # Errors
///
/// Returns `ChainError::EmptyRoute` for an empty route, or the first hop
/// failure reported by the connector.
#[instrument(skip(connector, route), fields(hops = route.len()))]
pub async fn build_chain<C: HopConnector>(
    connector: &C,
    route: &[&Hop],
) -> ChainResult<Chain<C::Transport>> {
    if route.is_empty() {
        return Err(ChainError::EmptyRoute);
    }

    let mut chain = Chain::with_capacity(route.len());
    for (index, hop) in route.iter().enumerate() {
        match connector.connect(index, hop, chain.current()).await {
            Ok(transport) => {
                debug!(hop = index, address = %hop.address, "Hop established");
                chain.transports.push(transport);
            }
            Err(e) => {
                warn!(hop = index, address = %hop.address, error = %e, "Hop failed");
                chain.release().await;
                return Err(e);
            }
        }
    }

    Ok(chain)
}
