//! Conversion of configuration records into targets
//!
//! Defaults are applied here once, and every stored password or passphrase
//! is decrypted eagerly so that no request ever touches the vault again.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use super::file::{ConfigFile, HopRecord, KafkaExporterRecord, PortValue, TargetRecord};
use super::{ConfigError, ConfigResult};
use crate::directory::TargetDirectory;
use crate::models::{
    DEFAULT_EXPORTER_STARTUP_DELAY_SECS, DEFAULT_KAFKA_EXPORTER_BINARY,
    DEFAULT_KAFKA_EXPORTER_PORT, DEFAULT_SSH_PORT, ExporterConfig, Hop, HopAddress,
    HopCredential, HostKeyPolicy, KafkaExporterConfig, Target,
};
use crate::vault::Vault;

/// Configuration file used when none is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "/etc/config.yml";

/// Reads and loads a configuration file into a directory snapshot
///
/// # Errors
///
/// Returns `ConfigError::Read` if the file cannot be read, or any error from
/// [`parse_str`].
pub fn load_file(path: &Path, vault: &Vault) -> ConfigResult<TargetDirectory> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_str(&content, vault, Some(path))
}

/// Parses YAML configuration text into a directory snapshot
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed, a secret cannot be
/// decrypted, a hop is invalid, or target names are missing or duplicated.
pub fn parse_str(yaml: &str, vault: &Vault, source: Option<&Path>) -> ConfigResult<TargetDirectory> {
    let file: ConfigFile = serde_yaml::from_str(yaml)?;

    let targets = file
        .targets
        .iter()
        .enumerate()
        .map(|(index, record)| build_target(index, record, vault))
        .collect::<ConfigResult<Vec<_>>>()?;

    TargetDirectory::from_targets(targets, source.map(Path::to_path_buf))
}

/// Builds a target from its record
///
/// `index` is the record's position in the file and is only used in errors.
///
/// # Errors
///
/// Returns `ConfigError` if any hop or exporter field is invalid.
pub fn build_target(index: usize, record: &TargetRecord, vault: &Vault) -> ConfigResult<Target> {
    let name = record.name.trim();
    if name.is_empty() {
        return Err(ConfigError::MissingName { index });
    }

    let relays = record
        .jump_hosts
        .iter()
        .enumerate()
        .map(|(i, hop)| build_hop(name, &format!("jump host #{}", i + 1), hop, vault))
        .collect::<ConfigResult<Vec<_>>>()?;

    let final_hop = build_hop(name, "final hop", &record.final_hop(), vault)?;

    let kafka = record
        .exporters
        .kafka_exporter
        .as_ref()
        .map(|section| build_kafka(name, section))
        .transpose()?;

    Ok(Target {
        name: name.to_string(),
        final_hop,
        relays,
        exporters: ExporterConfig { kafka },
    })
}

fn build_hop(target: &str, label: &str, record: &HopRecord, vault: &Vault) -> ConfigResult<Hop> {
    let default_port =
        resolve_port(target, "port", record.port.as_ref())?.unwrap_or(DEFAULT_SSH_PORT);
    let address =
        HopAddress::parse(&record.address, default_port).map_err(|source| ConfigError::Address {
            target: target.to_string(),
            hop: label.to_string(),
            source,
        })?;

    let user = record.user.trim();
    if user.is_empty() {
        return Err(ConfigError::InvalidValue {
            target: target.to_string(),
            field: "user",
            value: record.user.clone(),
        });
    }

    let decrypt = |field: &'static str, ciphertext: &str| {
        vault
            .decrypt(ciphertext)
            .map(SecretString::from)
            .map_err(|source| ConfigError::Secret {
                target: target.to_string(),
                hop: label.to_string(),
                field,
                source,
            })
    };

    let credential = if let Some(key_path) = non_empty(record.private_key.as_deref()) {
        if non_empty(record.password.as_deref()).is_some() {
            tracing::debug!(
                target_name = target,
                hop = label,
                "Both private_key and password set, using the private key"
            );
        }
        let passphrase = non_empty(record.passphrase.as_deref())
            .map(|p| decrypt("passphrase", p))
            .transpose()?;
        HopCredential::PrivateKey {
            path: expand_path(key_path),
            passphrase,
        }
    } else if let Some(password) = non_empty(record.password.as_deref()) {
        HopCredential::Password(decrypt("password", password)?)
    } else {
        return Err(ConfigError::MissingCredential {
            target: target.to_string(),
            hop: label.to_string(),
        });
    };

    Ok(Hop {
        address,
        user: user.to_string(),
        credential,
        host_key_policy: HostKeyPolicy::from_fingerprints(
            record
                .host_key_fingerprints
                .iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect(),
        ),
    })
}

fn build_kafka(target: &str, record: &KafkaExporterRecord) -> ConfigResult<KafkaExporterConfig> {
    let port = resolve_port(target, "kafka_exporter port", record.port.as_ref())?
        .unwrap_or(DEFAULT_KAFKA_EXPORTER_PORT);

    let servers = record
        .servers
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    Ok(KafkaExporterConfig {
        port,
        servers,
        binary: non_empty(record.binary.as_deref())
            .unwrap_or(DEFAULT_KAFKA_EXPORTER_BINARY)
            .to_string(),
        startup_delay_secs: record
            .startup_delay_secs
            .unwrap_or(DEFAULT_EXPORTER_STARTUP_DELAY_SECS),
    })
}

/// Resolves an optional port; an empty string counts as unset
fn resolve_port(
    target: &str,
    field: &'static str,
    value: Option<&PortValue>,
) -> ConfigResult<Option<u16>> {
    let invalid = |value: String| ConfigError::InvalidValue {
        target: target.to_string(),
        field,
        value,
    };

    match value {
        None => Ok(None),
        Some(PortValue::Number(0)) => Err(invalid("0".to_string())),
        Some(PortValue::Number(port)) => Ok(Some(*port)),
        Some(PortValue::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(PortValue::Text(text)) => match text.trim().parse::<u16>() {
            Ok(port) if port != 0 => Ok(Some(port)),
            _ => Err(invalid(text.clone())),
        },
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
