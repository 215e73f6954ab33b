//! Configuration loading for promrelay
//!
//! The configuration is a YAML list of targets. Loading is all-or-nothing:
//! any read, parse, decryption or validation error fails the whole load, so a
//! misconfigured relay never serves a partial or wrong set of targets.

mod file;
mod loader;

use thiserror::Error;

use crate::models::AddressError;
use crate::vault::VaultError;

pub use file::{
    ConfigFile, ExportersRecord, HopRecord, KafkaExporterRecord, PortValue, TargetRecord,
};
pub use loader::{DEFAULT_CONFIG_FILE, build_target, load_file, parse_str};

/// Errors that can occur while loading the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read configuration file '{path}': {source}")]
    Read {
        /// Path of the configuration file
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid YAML for the expected layout
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A target entry has an empty name
    #[error("Target entry #{index} has no name")]
    MissingName {
        /// Zero-based position in the target list
        index: usize,
    },

    /// Two targets share a name
    #[error("Duplicate target name '{0}'")]
    DuplicateTarget(String),

    /// A hop has neither a password nor a private key
    #[error("Target '{target}': {hop} has no password or private key")]
    MissingCredential {
        /// Target name
        target: String,
        /// Hop description, e.g. `jump host #1`
        hop: String,
    },

    /// A stored secret could not be decrypted
    #[error("Target '{target}': cannot decrypt {field} of {hop}: {source}")]
    Secret {
        /// Target name
        target: String,
        /// Hop description
        hop: String,
        /// Field name (`password` or `passphrase`)
        field: &'static str,
        /// Vault error
        #[source]
        source: VaultError,
    },

    /// A hop address is malformed
    #[error("Target '{target}': {hop}: {source}")]
    Address {
        /// Target name
        target: String,
        /// Hop description
        hop: String,
        /// Address error
        #[source]
        source: AddressError,
    },

    /// A field holds a value of the right type but an unusable content
    #[error("Target '{target}': invalid {field} '{value}'")]
    InvalidValue {
        /// Target name
        target: String,
        /// Field name
        field: &'static str,
        /// Offending value
        value: String,
    },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
