//! One-shot collection printed to stdout.

use std::sync::Arc;
use std::time::Duration;

use promrelay_core::{
    CancellationToken, CollectSettings, Collector, DirectoryHandle, SshConnector,
    render_placeholder,
};

use crate::cli::TimeoutArgs;
use crate::commands::GlobalOptions;
use crate::error::CliError;
use crate::util::{load_directory, load_vault, runtime, timeout_from_secs};

/// Collects once and prints the exposition text, or the placeholder on failure
pub fn cmd_collect(
    global: &GlobalOptions,
    target: &str,
    exporter: &str,
    timeouts: TimeoutArgs,
) -> Result<(), CliError> {
    let vault = Arc::new(load_vault(global.secret_file.as_deref())?);
    let directory = Arc::new(DirectoryHandle::new(load_directory(
        &global.config_file,
        &vault,
    )?));
    let connector =
        SshConnector::new().with_connect_timeout(Duration::from_secs(timeouts.connect_timeout));
    let collector = Collector::new(
        directory,
        vault,
        connector,
        CollectSettings {
            command_timeout: timeout_from_secs(timeouts.command_timeout),
        },
    );

    let rt = runtime()?;
    let result = rt.block_on(async {
        let cancel = CancellationToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };
        let result = collector.try_collect(target, exporter, &cancel).await;
        interrupt.abort();
        result
    });

    match result {
        Ok(text) => {
            print!("{text}");
            Ok(())
        }
        Err(e) => {
            print!("{}", render_placeholder(&e));
            Err(e.into())
        }
    }
}
