//! Target listing.

use crate::commands::GlobalOptions;
use crate::error::CliError;
use crate::util::{load_directory, load_vault};

/// Prints the configured targets as a table
pub fn cmd_list(global: &GlobalOptions) -> Result<(), CliError> {
    let vault = load_vault(global.secret_file.as_deref())?;
    let directory = load_directory(&global.config_file, &vault)?;

    if directory.is_empty() {
        println!("No targets configured.");
        return Ok(());
    }

    println!("{:<24} {:<32} {:>4}  EXPORTERS", "NAME", "ADDRESS", "HOPS");
    for target in directory.names().into_iter().filter_map(|name| directory.lookup(name)) {
        let exporters = if target.exporters.kafka.is_some() {
            "kafka_exporter"
        } else {
            "-"
        };
        println!(
            "{:<24} {:<32} {:>4}  {}",
            target.name,
            target.final_hop.address.to_string(),
            target.route_len(),
            exporters
        );
    }
    Ok(())
}
