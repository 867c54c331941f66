//! # huddle-relay
//!
//! Chat relay server binary: loads settings, installs logging and metrics,
//! and serves the WebSocket endpoint until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use huddle_server::server::HuddleServer;
use huddle_settings::HuddleSettings;

/// Presence-aware chat relay.
#[derive(Parser, Debug)]
#[command(name = "huddle-relay", version, about = "Presence-aware chat relay")]
struct Cli {
    /// Settings file (defaults to `~/.huddle/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    fn resolve_settings(&self) -> Result<HuddleSettings> {
        let mut settings = match &self.config {
            Some(path) => huddle_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => huddle_settings::load_settings().context("Failed to load settings")?,
        };
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.resolve_settings()?;

    huddle_logging::init_logging(&settings.logging).context("Failed to initialize logging")?;
    let metrics =
        huddle_server::metrics::install_recorder().context("Failed to install metrics recorder")?;

    let server = HuddleServer::new(settings, Some(metrics));
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("huddle relay listening on ws://{addr}/ws");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.graceful_shutdown(vec![handle], None).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["huddle-relay"]);
        assert!(cli.config.is_none());
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server": {{"host": "0.0.0.0", "port": 9000}}, "presence": {{"max_nickname_chars": 12}}}}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_owned();

        let cli = Cli::parse_from(["huddle-relay", "--config", &path, "--port", "7000"]);
        let settings = cli.resolve_settings().unwrap();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 7000);

        let cli = Cli::parse_from(["huddle-relay", "--config", &path, "--host", "127.0.0.2"]);
        let settings = cli.resolve_settings().unwrap();
        assert_eq!(settings.server.host, "127.0.0.2");
        assert_eq!(settings.server.port, 9000);
    }

    #[test]
    fn invalid_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server": {{"max_connections": 0}}}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_owned();

        let cli = Cli::parse_from(["huddle-relay", "--config", &path]);
        let err = cli.resolve_settings().unwrap_err();
        assert!(err.to_string().contains("Failed to load settings"));
    }
}
