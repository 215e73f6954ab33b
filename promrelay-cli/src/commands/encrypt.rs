//! Encrypts values for the `password` and `passphrase` fields.

use std::path::Path;

use secrecy::ExposeSecret;

use crate::error::CliError;
use crate::util::{load_vault, prompt_secret, read_stdin_line};

/// Prints the ciphertext of a prompted (or piped) value
pub fn cmd_encrypt(secret_file: Option<&Path>, from_stdin: bool) -> Result<(), CliError> {
    let vault = load_vault(secret_file)?;

    let plaintext = if from_stdin {
        read_stdin_line()?
    } else {
        prompt_secret("Enter value to encrypt: ")?
    };

    let ciphertext = vault.encrypt(plaintext.expose_secret())?;
    println!("{ciphertext}");
    Ok(())
}
