//! promrelay - relay Prometheus exporters through chains of SSH hosts

mod cli;
mod commands;
mod error;
mod server;
mod util;

use clap::Parser;
use promrelay_core::tracing::{TracingConfig, TracingLevel, init_tracing};

use crate::cli::Cli;
use crate::commands::GlobalOptions;

fn main() {
    let cli = Cli::parse();

    let level = TracingLevel::from_verbosity(cli.verbose, cli.quiet);
    if let Err(e) = init_tracing(&TracingConfig::new().with_level(level)) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let global = GlobalOptions {
        config_file: cli.config_file,
        secret_file: cli.secret_file,
    };

    if let Err(e) = commands::dispatch(&global, cli.command) {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}
