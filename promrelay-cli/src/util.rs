//! Shared utility functions used across command modules.

use std::io::BufRead;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use promrelay_core::config;
use promrelay_core::vault::default_key_file;
use promrelay_core::{TargetDirectory, Vault};
use secrecy::SecretString;

use crate::error::CliError;

/// Loads the vault from `--secret.file`, or from the default key location
pub fn load_vault(secret_file: Option<&Path>) -> Result<Vault, CliError> {
    let default_path = default_key_file();
    let path = secret_file.or(default_path.as_deref());
    Ok(Vault::load(path)?)
}

/// Loads the target directory from the configuration file
pub fn load_directory(config_file: &Path, vault: &Vault) -> Result<TargetDirectory, CliError> {
    Ok(config::load_file(config_file, vault)?)
}

/// Creates the tokio runtime for async commands
pub fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new().map_err(|e| CliError::Server(format!("Runtime error: {e}")))
}

/// Converts a timeout in seconds, where 0 means none
pub const fn timeout_from_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

/// Parses `:port`, `host:port` or `[v6]:port`; an empty host binds all interfaces
pub fn parse_listen_address(address: &str) -> Result<SocketAddr, CliError> {
    let invalid = || CliError::Config(format!("Invalid listen address '{address}'"));

    if let Some(port) = address.strip_prefix(':') {
        let port: u16 = port.parse().map_err(|_| invalid())?;
        return Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)));
    }
    address.parse().map_err(|_| invalid())
}

/// Prompts on stderr and reads a line without echo
pub fn prompt_secret(prompt: &str) -> Result<SecretString, CliError> {
    eprint!("{prompt}");
    rpassword::read_password()
        .map(SecretString::from)
        .map_err(|e| CliError::Secret(format!("Failed to read input: {e}")))
}

/// Reads one line from stdin, without its line terminator
pub fn read_stdin_line() -> Result<SecretString, CliError> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let trimmed = line.trim_end_matches(['\r', '\n']).to_string();
    Ok(SecretString::from(trimmed))
}
