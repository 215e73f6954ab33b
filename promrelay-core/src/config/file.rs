//! On-disk configuration records
//!
//! These mirror the YAML layout one-to-one. Field names follow the format
//! already deployed (`address`, `private_key`, `jump_hosts`, `kafka.server`).
//! Conversion into [`crate::models`] types, including defaulting and secret
//! decryption, lives in [`super::loader`].

use serde::{Deserialize, Serialize};

/// Root of the configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Collection targets
    #[serde(default)]
    pub targets: Vec<TargetRecord>,
}

/// A port given either as a YAML integer or as a quoted string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    /// `port: 22`
    Number(u16),
    /// `port: "22"`
    Text(String),
}

/// A relay (jump host) entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopRecord {
    /// `host` or `host:port`
    pub address: String,
    /// SSH port when `address` has none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<PortValue>,
    /// Login user
    #[serde(default)]
    pub user: String,
    /// Encrypted password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Path to a private key file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// Encrypted private key passphrase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    /// Trusted host key fingerprints (`SHA256:...`); empty accepts any key
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_key_fingerprints: Vec<String>,
}

/// A target entry: the final hop's connection fields plus its route and exporters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRecord {
    /// Unique target name used in collection requests
    pub name: String,
    /// `host` or `host:port` of the final host
    pub address: String,
    /// SSH port when `address` has none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<PortValue>,
    /// Login user
    #[serde(default)]
    pub user: String,
    /// Encrypted password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Path to a private key file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// Encrypted private key passphrase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    /// Trusted host key fingerprints (`SHA256:...`); empty accepts any key
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_key_fingerprints: Vec<String>,
    /// Relays traversed in order before reaching this host
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jump_hosts: Vec<HopRecord>,
    /// Exporter parameters keyed by exporter kind
    #[serde(default)]
    pub exporters: ExportersRecord,
}

impl TargetRecord {
    /// Returns the final hop's connection fields as a hop record
    #[must_use]
    pub fn final_hop(&self) -> HopRecord {
        HopRecord {
            address: self.address.clone(),
            port: self.port.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            private_key: self.private_key.clone(),
            passphrase: self.passphrase.clone(),
            host_key_fingerprints: self.host_key_fingerprints.clone(),
        }
    }
}

/// Exporter sections of a target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportersRecord {
    /// `kafka_exporter` section
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kafka_exporter: Option<KafkaExporterRecord>,
}

/// `kafka_exporter` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaExporterRecord {
    /// Exporter listen port (default 9308)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<PortValue>,
    /// Kafka broker addresses
    #[serde(default, rename = "kafka.server")]
    pub servers: Vec<String>,
    /// Exporter binary path on the target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,
    /// Seconds to wait before scraping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_delay_secs: Option<u32>,
}
