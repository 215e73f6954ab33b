//! Core data structures: hops, targets and exporter parameters
//!
//! Everything here is built once by [`crate::config`] and never mutated
//! afterwards. Secrets are held as [`SecretString`] so they stay out of
//! `Debug` output and logs.

use std::fmt;
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default listen port of `kafka_exporter`
pub const DEFAULT_KAFKA_EXPORTER_PORT: u16 = 9308;

/// Exporter binary path, relative to the remote user's home directory
pub const DEFAULT_KAFKA_EXPORTER_BINARY: &str = ".promethues_exporter/kafka_exporter";

/// Seconds to wait for the exporter to start listening before scraping it
pub const DEFAULT_EXPORTER_STARTUP_DELAY_SECS: u32 = 3;

/// Error returned when a hop address cannot be parsed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    /// The address has no host part
    #[error("Address '{0}' has no host")]
    MissingHost(String),
    /// The port is not a valid TCP port
    #[error("Address '{address}' has an invalid port '{port}'")]
    InvalidPort {
        /// The full address
        address: String,
        /// The offending port text
        port: String,
    },
}

/// Network location of a hop
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HopAddress {
    /// Hostname or IP address (IPv6 without brackets)
    pub host: String,
    /// TCP port of the SSH server
    pub port: u16,
}

impl HopAddress {
    /// Creates an address from its parts
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parses `host`, `host:port`, `[v6]` or `[v6]:port`.
    ///
    /// A bare IPv6 literal without brackets is taken as a host. When the
    /// address carries no port, `default_port` is used.
    ///
    /// # Errors
    ///
    /// Returns `AddressError` if the host is empty or the port is invalid.
    pub fn parse(address: &str, default_port: u16) -> Result<Self, AddressError> {
        let address = address.trim();

        let (host, port) = if let Some(rest) = address.strip_prefix('[') {
            match rest.split_once(']') {
                Some((host, "")) => (host, None),
                Some((host, tail)) => match tail.strip_prefix(':') {
                    Some(port) => (host, Some(port)),
                    None => (address, None),
                },
                None => (address, None),
            }
        } else {
            match address.split_once(':') {
                Some((host, port)) if !port.contains(':') => (host, Some(port)),
                _ => (address, None),
            }
        };

        if host.is_empty() {
            return Err(AddressError::MissingHost(address.to_string()));
        }

        let port = match port {
            Some(text) => text.parse::<u16>().ok().filter(|p| *p != 0).ok_or_else(|| {
                AddressError::InvalidPort {
                    address: address.to_string(),
                    port: text.to_string(),
                }
            })?,
            None => default_port,
        };

        Ok(Self::new(host, port))
    }
}

impl fmt::Display for HopAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// How a hop proves the user's identity
#[derive(Debug, Clone)]
pub enum HopCredential {
    /// Password authentication
    Password(SecretString),
    /// Public key authentication; the key file is read on this host
    PrivateKey {
        /// Path to the private key file
        path: PathBuf,
        /// Passphrase protecting the key, if any
        passphrase: Option<SecretString>,
    },
}

impl HopCredential {
    /// Short name of the authentication method, safe to log
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::PrivateKey { .. } => "publickey",
        }
    }
}

/// Server identity check applied during the SSH handshake
///
/// The default accepts any host key, matching existing deployments. Listing
/// fingerprints switches the hop to strict checking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept whatever key the server presents
    #[default]
    AcceptAny,
    /// Accept only keys whose SHA-256 fingerprint (`SHA256:...`) is listed
    Trusted(Vec<String>),
}

impl HostKeyPolicy {
    /// Builds a policy from a fingerprint list; an empty list accepts any key
    #[must_use]
    pub fn from_fingerprints(fingerprints: Vec<String>) -> Self {
        if fingerprints.is_empty() {
            Self::AcceptAny
        } else {
            Self::Trusted(fingerprints)
        }
    }

    /// Checks a presented fingerprint against the policy
    #[must_use]
    pub fn accepts(&self, fingerprint: &str) -> bool {
        match self {
            Self::AcceptAny => true,
            Self::Trusted(trusted) => trusted.iter().any(|f| f == fingerprint),
        }
    }
}

/// One authenticated SSH hop: a relay or the final target host
#[derive(Debug, Clone)]
pub struct Hop {
    /// Where the SSH server listens
    pub address: HopAddress,
    /// Login user
    pub user: String,
    /// Credential used to authenticate
    pub credential: HopCredential,
    /// Host key verification policy
    pub host_key_policy: HostKeyPolicy,
}

impl Hop {
    /// Creates a hop that accepts any host key
    #[must_use]
    pub fn new(address: HopAddress, user: impl Into<String>, credential: HopCredential) -> Self {
        Self {
            address,
            user: user.into(),
            credential,
            host_key_policy: HostKeyPolicy::AcceptAny,
        }
    }

    /// Sets the host key policy
    #[must_use]
    pub fn with_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }
}

/// Parameters for running `kafka_exporter` on a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaExporterConfig {
    /// Loopback port the exporter listens on
    pub port: u16,
    /// Kafka broker addresses passed as `--kafka.server`
    pub servers: Vec<String>,
    /// Path of the exporter binary on the target
    pub binary: String,
    /// Seconds to wait between starting the exporter and scraping it
    pub startup_delay_secs: u32,
}

impl Default for KafkaExporterConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_KAFKA_EXPORTER_PORT,
            servers: Vec::new(),
            binary: DEFAULT_KAFKA_EXPORTER_BINARY.to_string(),
            startup_delay_secs: DEFAULT_EXPORTER_STARTUP_DELAY_SECS,
        }
    }
}

/// Exporter parameters of a target, keyed by exporter kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExporterConfig {
    /// `kafka_exporter` parameters, when configured
    pub kafka: Option<KafkaExporterConfig>,
}

/// A collection target and the route used to reach it
#[derive(Debug, Clone)]
pub struct Target {
    /// Unique target name
    pub name: String,
    /// The host the exporter runs on
    pub final_hop: Hop,
    /// Relay hosts traversed in order before the final hop
    pub relays: Vec<Hop>,
    /// Exporter parameters
    pub exporters: ExporterConfig,
}

impl Target {
    /// Returns the hops in dial order: relays first, then the final hop
    pub fn route(&self) -> impl Iterator<Item = &Hop> {
        self.relays.iter().chain(std::iter::once(&self.final_hop))
    }

    /// Number of hops in the route
    #[must_use]
    pub fn route_len(&self) -> usize {
        self.relays.len() + 1
    }
}
