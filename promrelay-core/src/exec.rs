//! Remote command execution over a built chain
//!
//! [`run`] consumes the chain: whatever happens to the command, the chain is
//! released innermost first before the result is returned.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::cancel::CancellationToken;
use crate::chain::{Chain, HopTransport};

/// Errors that can occur while running a remote command
#[derive(Debug, Error)]
pub enum ExecError {
    /// No session channel could be opened on the final hop
    #[error("cannot open session: {reason}")]
    Session {
        /// Failure description
        reason: String,
    },

    /// The command could not be started or its session broke
    #[error("command execution failed: {reason}")]
    Execution {
        /// Failure description
        reason: String,
    },

    /// The command did not finish before the deadline
    #[error("command timed out after {}s", .after.as_secs())]
    TimedOut {
        /// Deadline that expired
        after: Duration,
    },

    /// The request was cancelled
    #[error("command cancelled")]
    Cancelled,

    /// The chain holds no transport to run on
    #[error("chain has no established hop")]
    EmptyChain,
}

/// Output of a remote command
///
/// A non-zero exit status is reported here, not as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    /// Standard output and standard error, interleaved in arrival order
    pub output: Vec<u8>,
    /// Exit status, if the server reported one
    pub exit_status: Option<u32>,
    /// Name of the signal that ended the command, if any
    pub exit_signal: Option<String>,
}

impl CapturedOutput {
    /// Creates a captured output with an exit status
    #[must_use]
    pub fn new(output: impl Into<Vec<u8>>, exit_status: Option<u32>) -> Self {
        Self {
            output: output.into(),
            exit_status,
            exit_signal: None,
        }
    }

    /// Returns true unless the command reported a non-zero status or a signal
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_signal.is_none() && self.exit_status.is_none_or(|status| status == 0)
    }

    /// Output decoded as UTF-8, invalid sequences replaced
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

/// Deadline and cancellation for one command
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Maximum run time; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// Token that aborts the command when cancelled
    pub cancel: CancellationToken,
}

impl ExecOptions {
    /// Sets the deadline
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the cancellation token
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Runs `command` on the chain's final hop and releases the chain
///
/// # Errors
///
/// Returns `ExecError` if the chain is empty, the session or command fails,
/// the deadline expires, or the token is cancelled. The chain is released in
/// every case.
#[instrument(skip(chain, command, options), fields(hops = chain.len()))]
pub async fn run<T: HopTransport>(
    chain: Chain<T>,
    command: &str,
    options: &ExecOptions,
) -> Result<CapturedOutput, ExecError> {
    let result = match chain.current() {
        Some(transport) => execute(transport, command, options).await,
        None => Err(ExecError::EmptyChain),
    };

    chain.release().await;

    if let Ok(captured) = &result {
        debug!(
            bytes = captured.output.len(),
            exit_status = ?captured.exit_status,
            "Command finished"
        );
    }
    result
}

async fn execute<T: HopTransport>(
    transport: &T,
    command: &str,
    options: &ExecOptions,
) -> Result<CapturedOutput, ExecError> {
    let bounded = async {
        match options.timeout {
            Some(after) => tokio::time::timeout(after, transport.run_command(command))
                .await
                .map_err(|_| ExecError::TimedOut { after })?,
            None => transport.run_command(command).await,
        }
    };

    tokio::select! {
        biased;
        () = options.cancel.cancelled() => Err(ExecError::Cancelled),
        result = bounded => result,
    }
}
