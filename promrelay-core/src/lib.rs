//! promrelay core library
//!
//! Collects Prometheus metrics from hosts that are only reachable through one
//! or more SSH jump hosts. A request names a target and an exporter; the
//! collector opens a chain of SSH connections to the target, runs the
//! exporter there, scrapes it over loopback and tears the chain down again.
//!
//! # Crate Structure
//!
//! - [`vault`] - AES-256-CTR encryption of secrets stored in the configuration
//! - [`models`] - Hops, targets and exporter parameters
//! - [`config`] - YAML configuration loading
//! - [`directory`] - Versioned, atomically swapped target directory
//! - [`chain`] - Multi-hop connection chains and the SSH transport
//! - [`exec`] - Remote command execution with deadline and cancellation
//! - [`collect`] - Request dispatch and exporter command templates
//! - [`cancel`] - Cancellation tokens
//! - [`tracing`] - Logging setup

#![warn(missing_docs)]

pub mod cancel;
pub mod chain;
pub mod collect;
pub mod config;
pub mod directory;
pub mod error;
pub mod exec;
pub mod models;
pub mod tracing;
pub mod vault;

pub use cancel::CancellationToken;
pub use chain::{
    Chain, ChainError, ChainResult, HopConnector, HopTransport, SshConnector, SshTransport,
    build_chain,
};
pub use collect::{
    CollectError, CollectSettings, Collector, DEFAULT_COMMAND_TIMEOUT, ExporterKind,
    render_placeholder,
};
pub use config::{ConfigError, ConfigResult, DEFAULT_CONFIG_FILE};
pub use directory::{DirectoryHandle, TargetDirectory};
pub use error::{RelayError, RelayResult};
pub use exec::{CapturedOutput, ExecError, ExecOptions};
pub use models::{
    AddressError, ExporterConfig, Hop, HopAddress, HopCredential, HostKeyPolicy,
    KafkaExporterConfig, Target,
};
pub use vault::{Vault, VaultError, VaultResult};
