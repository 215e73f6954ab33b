//! Metric collection dispatcher
//!
//! Turns a `(target, exporter)` request into text. [`Collector::try_collect`]
//! reports failures as [`CollectError`]; [`Collector::collect`] never fails and
//! renders any error as a single Prometheus comment line instead.

pub mod kafka;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::cancel::CancellationToken;
use crate::chain::{self, ChainError, HopConnector};
use crate::directory::DirectoryHandle;
use crate::exec::{self, CapturedOutput, ExecError, ExecOptions};
use crate::models::{Hop, Target};
use crate::vault::{Vault, VaultError};

/// Default deadline for one remote command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors that can occur while serving a collection request
#[derive(Debug, Error)]
pub enum CollectError {
    /// The exporter kind is not supported
    #[error("unknown exporter '{0}'")]
    UnknownExporter(String),

    /// No target with this name is configured
    #[error("target '{0}' not found")]
    UnknownTarget(String),

    /// The target has no section for this exporter
    #[error("exporter '{exporter}' is not configured for target '{target}'")]
    ExporterNotConfigured {
        /// Target name
        target: String,
        /// Exporter kind
        exporter: String,
    },

    /// The exporter section lists no backend servers
    #[error("target '{target}': kafka: client has run out of available brokers")]
    NoBackendsConfigured {
        /// Target name
        target: String,
    },

    /// The chain to the target could not be built
    #[error("target '{target}': {source}")]
    Chain {
        /// Target name
        target: String,
        /// Chain error
        #[source]
        source: ChainError,
    },

    /// The remote command failed
    #[error("target '{target}': {source}")]
    Exec {
        /// Target name
        target: String,
        /// Executor error
        #[source]
        source: ExecError,
    },

    /// The command exited unsuccessfully without output
    #[error("target '{target}': remote command failed with {status} and no output")]
    RemoteFailure {
        /// Target name
        target: String,
        /// Exit status or signal description
        status: String,
    },

    /// Encrypting the utility request failed
    #[error("encryption failed: {0}")]
    Encrypt(#[from] VaultError),
}

/// Kinds of request a collector serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExporterKind {
    /// Run `kafka_exporter` on the target and scrape it
    Kafka,
    /// Encrypt the `target` argument with the loaded key
    Encrypt,
}

impl ExporterKind {
    /// Name used in requests
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kafka => "kafka_exporter",
            Self::Encrypt => "encrypt",
        }
    }
}

impl fmt::Display for ExporterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExporterKind {
    type Err = CollectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kafka_exporter" => Ok(Self::Kafka),
            "encrypt" => Ok(Self::Encrypt),
            other => Err(CollectError::UnknownExporter(other.to_string())),
        }
    }
}

/// Collector tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectSettings {
    /// Deadline for the remote command; `None` waits indefinitely
    pub command_timeout: Option<Duration>,
}

impl Default for CollectSettings {
    fn default() -> Self {
        Self {
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
        }
    }
}

/// Serves collection requests against the current target directory
pub struct Collector<C: HopConnector> {
    directory: Arc<DirectoryHandle>,
    vault: Arc<Vault>,
    connector: C,
    settings: CollectSettings,
}

impl<C: HopConnector> Collector<C> {
    /// Creates a collector
    #[must_use]
    pub const fn new(
        directory: Arc<DirectoryHandle>,
        vault: Arc<Vault>,
        connector: C,
        settings: CollectSettings,
    ) -> Self {
        Self {
            directory,
            vault,
            connector,
            settings,
        }
    }

    /// The directory handle this collector reads from
    #[must_use]
    pub const fn directory(&self) -> &Arc<DirectoryHandle> {
        &self.directory
    }

    /// The connector used to reach targets
    #[must_use]
    pub const fn connector(&self) -> &C {
        &self.connector
    }

    /// Collects metrics, rendering any failure as a comment line
    pub async fn collect(&self, target: &str, exporter: &str) -> String {
        self.collect_with(target, exporter, &CancellationToken::new())
            .await
    }

    /// Like [`Self::collect`], aborting when `cancel` is cancelled
    pub async fn collect_with(
        &self,
        target: &str,
        exporter: &str,
        cancel: &CancellationToken,
    ) -> String {
        match self.try_collect(target, exporter, cancel).await {
            Ok(text) => text,
            Err(e) => {
                warn!(target_name = target, exporter, error = %e, "Collection failed");
                render_placeholder(&e)
            }
        }
    }

    /// Collects metrics for `target` with the given exporter
    ///
    /// # Errors
    ///
    /// Returns `CollectError` for unknown exporters or targets, missing
    /// exporter configuration, chain or command failures, and commands that
    /// fail without output.
    #[instrument(skip(self, target, exporter, cancel), fields(target_name = target, exporter))]
    pub async fn try_collect(
        &self,
        target: &str,
        exporter: &str,
        cancel: &CancellationToken,
    ) -> Result<String, CollectError> {
        match exporter.parse::<ExporterKind>()? {
            ExporterKind::Encrypt => Ok(self.vault.encrypt(target)?),
            ExporterKind::Kafka => {
                let record = self.lookup(target)?;
                let config = record.exporters.kafka.as_ref().ok_or_else(|| {
                    CollectError::ExporterNotConfigured {
                        target: record.name.clone(),
                        exporter: ExporterKind::Kafka.to_string(),
                    }
                })?;
                if config.servers.is_empty() {
                    return Err(CollectError::NoBackendsConfigured {
                        target: record.name.clone(),
                    });
                }
                let command = kafka::render_command(config);
                let captured = self.run_remote(&record, &command, cancel).await?;
                interpret(&record.name, captured)
            }
        }
    }

    fn lookup(&self, target: &str) -> Result<Arc<Target>, CollectError> {
        self.directory
            .snapshot()
            .lookup(target)
            .ok_or_else(|| CollectError::UnknownTarget(target.to_string()))
    }

    async fn run_remote(
        &self,
        target: &Target,
        command: &str,
        cancel: &CancellationToken,
    ) -> Result<CapturedOutput, CollectError> {
        let route: Vec<&Hop> = target.route().collect();
        let exec_error = |source: ExecError| CollectError::Exec {
            target: target.name.clone(),
            source,
        };

        let chain = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(exec_error(ExecError::Cancelled)),
            built = chain::build_chain(&self.connector, &route) => {
                built.map_err(|source| CollectError::Chain {
                    target: target.name.clone(),
                    source,
                })?
            }
        };

        let options = ExecOptions::default()
            .with_timeout(self.settings.command_timeout)
            .with_cancel(cancel.clone());
        exec::run(chain, command, &options).await.map_err(exec_error)
    }
}

impl<C: HopConnector> fmt::Debug for Collector<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn interpret(target: &str, captured: CapturedOutput) -> Result<String, CollectError> {
    if captured.is_success() {
        info!(target_name = target, bytes = captured.output.len(), "Collected");
        return Ok(captured.text());
    }

    let status = match (&captured.exit_signal, captured.exit_status) {
        (Some(signal), _) => format!("signal {signal}"),
        (None, Some(code)) => format!("exit status {code}"),
        (None, None) => "no exit status".to_string(),
    };

    if captured.output.is_empty() {
        return Err(CollectError::RemoteFailure {
            target: target.to_string(),
            status,
        });
    }

    warn!(target_name = target, %status, "Remote command failed, returning its output");
    Ok(captured.text())
}

/// Renders an error as a one-line Prometheus comment
#[must_use]
pub fn render_placeholder(error: &impl fmt::Display) -> String {
    let message = error.to_string();
    let line = message
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    format!("# {line}\n")
}
