//! `kafka_exporter` command template
//!
//! The exporter is started in the background on the target, given time to
//! bind its port, scraped once over loopback and then killed.

use crate::models::KafkaExporterConfig;

/// Renders the remote command for one scrape
#[must_use]
pub fn render_command(config: &KafkaExporterConfig) -> String {
    let servers: String = config
        .servers
        .iter()
        .map(|server| format!(" --kafka.server={}", shell_quote(server)))
        .collect();

    format!(
        "({binary} --web.listen-address=:{port}{servers} > /dev/null 2>&1 & sleep {delay}; \
         curl -s http://localhost:{port}/metrics) && pkill kafka_exporter",
        binary = shell_quote(&config.binary),
        port = config.port,
        delay = config.startup_delay_secs,
    )
}

/// Quotes `value` for a POSIX shell
///
/// Values made only of safe characters are returned unchanged.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._-:/@%+=,~".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
