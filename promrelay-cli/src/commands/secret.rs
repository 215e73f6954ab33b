//! Secret key file creation.

use std::path::Path;

use promrelay_core::Vault;
use promrelay_core::vault::{KEY_LEN, default_key_file};
use secrecy::ExposeSecret;

use crate::error::CliError;
use crate::util::prompt_secret;

/// Prompts for a key and writes it to `--secret.file` or the default location
pub fn cmd_secret(secret_file: Option<&Path>) -> Result<(), CliError> {
    let path = secret_file
        .map(Path::to_path_buf)
        .or_else(default_key_file)
        .ok_or_else(|| {
            CliError::Secret(
                "No configuration directory found; pass --secret.file".to_string(),
            )
        })?;

    let key = prompt_secret(&format!("Enter a {KEY_LEN}-character secret key: "))?;
    let bytes = key.expose_secret().as_bytes();
    if bytes.len() != KEY_LEN {
        return Err(CliError::Secret(format!(
            "Secret key must be exactly {KEY_LEN} bytes, got {}",
            bytes.len()
        )));
    }

    Vault::write_key_file(&path, bytes)?;
    println!("Secret key written to {}", path.display());
    Ok(())
}
