//! CLI argument parsing types using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use promrelay_core::config::DEFAULT_CONFIG_FILE;

/// Default `--web.listen-address`
pub const DEFAULT_LISTEN_ADDRESS: &str = ":3001";

/// promrelay command-line interface
#[derive(Parser)]
#[command(name = "promrelay")]
#[command(
    author,
    version,
    about = "Relay Prometheus exporters running behind SSH jump hosts"
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the target configuration file
    #[arg(
        long = "config.file",
        global = true,
        value_name = "PATH",
        default_value = DEFAULT_CONFIG_FILE
    )]
    pub config_file: PathBuf,

    /// Path to the secret key file [default: <config dir>/promrelay/secret.key]
    #[arg(
        long = "secret.file",
        global = true,
        value_name = "PATH",
        env = "PROMRELAY_SECRET_FILE"
    )]
    pub secret_file: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Timeouts shared by commands that reach targets
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct TimeoutArgs {
    /// Seconds a remote command may run (0 waits indefinitely)
    #[arg(long = "command.timeout", value_name = "SECONDS", default_value_t = 60)]
    pub command_timeout: u64,

    /// Seconds allowed to dial and handshake each hop
    #[arg(long = "connect.timeout", value_name = "SECONDS", default_value_t = 30)]
    pub connect_timeout: u64,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Serve collection requests over HTTP
    #[command(about = "Serve /metrics?target=<name>&exporter=<kind> over HTTP")]
    Serve {
        /// Address to listen on, e.g. `:3001` or `127.0.0.1:3001`
        #[arg(
            long = "web.listen-address",
            value_name = "ADDRESS",
            default_value = DEFAULT_LISTEN_ADDRESS
        )]
        listen_address: String,

        #[command(flatten)]
        timeouts: TimeoutArgs,
    },

    /// Write a new secret key file
    #[command(about = "Prompt for a 32-byte secret key and write it to the secret file")]
    Secret,

    /// Encrypt a value for the configuration file
    #[command(about = "Encrypt a password or passphrase with the secret key")]
    Encrypt {
        /// Read the plaintext from standard input instead of prompting
        #[arg(long)]
        stdin: bool,
    },

    /// Collect metrics from one target and print them
    #[command(about = "Run one collection and print the result to stdout")]
    Collect {
        /// Target name from the configuration file
        target: String,

        /// Exporter kind
        #[arg(default_value = "kafka_exporter")]
        exporter: String,

        #[command(flatten)]
        timeouts: TimeoutArgs,
    },

    /// List configured targets
    #[command(about = "List targets in the configuration file")]
    List,
}
