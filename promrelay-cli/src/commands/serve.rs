//! HTTP serving with SIGHUP configuration reload.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use promrelay_core::{CollectSettings, Collector, DirectoryHandle, SshConnector, Vault};
use tracing::info;

use crate::cli::TimeoutArgs;
use crate::commands::GlobalOptions;
use crate::error::CliError;
use crate::server;
use crate::util::{load_directory, load_vault, parse_listen_address, runtime, timeout_from_secs};

/// Loads the configuration and serves `/metrics` until interrupted
pub fn cmd_serve(
    global: &GlobalOptions,
    listen_address: &str,
    timeouts: TimeoutArgs,
) -> Result<(), CliError> {
    let address = parse_listen_address(listen_address)?;
    let vault = Arc::new(load_vault(global.secret_file.as_deref())?);
    let directory = Arc::new(DirectoryHandle::new(load_directory(
        &global.config_file,
        &vault,
    )?));
    info!(
        path = %global.config_file.display(),
        targets = directory.snapshot().len(),
        "Configuration loaded"
    );

    let connector =
        SshConnector::new().with_connect_timeout(Duration::from_secs(timeouts.connect_timeout));
    let collector = Arc::new(Collector::new(
        Arc::clone(&directory),
        Arc::clone(&vault),
        connector,
        CollectSettings {
            command_timeout: timeout_from_secs(timeouts.command_timeout),
        },
    ));

    let rt = runtime()?;
    let config_file = global.config_file.clone();
    rt.block_on(async move {
        let reloader = tokio::spawn(reload_on_hangup(directory, vault, config_file));
        let served = server::run(address, collector).await;
        reloader.abort();
        served
    })
}

#[cfg(unix)]
async fn reload_on_hangup(directory: Arc<DirectoryHandle>, vault: Arc<Vault>, path: PathBuf) {
    use tokio::signal::unix::{SignalKind, signal};
    use tracing::{error, warn};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "Cannot install SIGHUP handler, reload disabled");
            return;
        }
    };

    while hangup.recv().await.is_some() {
        info!(path = %path.display(), "SIGHUP received, reloading configuration");
        if let Err(e) = directory.reload(&path, &vault) {
            error!(error = %e, "Reload failed, keeping previous targets");
        }
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup(_directory: Arc<DirectoryHandle>, _vault: Arc<Vault>, _path: PathBuf) {}
