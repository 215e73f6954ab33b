//! Command handlers for the promrelay CLI.

mod collect;
mod encrypt;
mod list;
mod secret;
mod serve;

use std::path::PathBuf;

use crate::cli::Commands;
use crate::error::CliError;

/// Options shared by every subcommand
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    /// `--config.file`
    pub config_file: PathBuf,
    /// `--secret.file`; `None` uses the default key location
    pub secret_file: Option<PathBuf>,
}

/// Dispatches a parsed CLI command to the appropriate handler.
pub fn dispatch(global: &GlobalOptions, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Serve {
            listen_address,
            timeouts,
        } => serve::cmd_serve(global, &listen_address, timeouts),
        Commands::Secret => secret::cmd_secret(global.secret_file.as_deref()),
        Commands::Encrypt { stdin } => encrypt::cmd_encrypt(global.secret_file.as_deref(), stdin),
        Commands::Collect {
            target,
            exporter,
            timeouts,
        } => collect::cmd_collect(global, &target, &exporter, timeouts),
        Commands::List => list::cmd_list(global),
    }
}
