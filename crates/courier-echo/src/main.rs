//! Courier echo server
//!
//! Runs the echo fixture until SIGINT or SIGTERM.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tokio::sync::broadcast;
use tracing::{error, info};

use courier_echo::EchoConfig;

#[derive(Debug, Parser)]
#[command(name = "courier-echo", version, about = "HTTP echo server for courier tests")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind, overriding the configuration
    #[arg(short, long)]
    bind: Option<String>,

    /// Port to listen on, overriding the configuration
    #[arg(short, long)]
    port: Option<u16>,
}

impl Args {
    fn into_config(self) -> courier_echo::Result<EchoConfig> {
        let mut config = match &self.config {
            Some(path) => EchoConfig::load(path)?,
            None => EchoConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Initializes structured logging with tracing.
///
/// `COURIER_ECHO_LOG_FORMAT=json` selects JSON output; anything else is
/// pretty. The level comes from `RUST_LOG`.
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let format = std::env::var("COURIER_ECHO_LOG_FORMAT")
        .unwrap_or_else(|_| "pretty".to_string())
        .to_lowercase();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("courier_echo=info"));

    match format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .init();
        }
        _ => {
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(false)
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return Err(e.into());
        }
    };

    let listener = courier_echo::bind(&config)
        .await
        .with_context(|| format!("Failed to bind {}", config.address()))?;

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

    let mut signals = Signals::new([SIGTERM, SIGINT])?;
    let handle = signals.handle();
    tokio::spawn(async move {
        use futures::stream::StreamExt;
        while let Some(signal) = signals.next().await {
            match signal {
                SIGTERM => info!("Received SIGTERM, initiating graceful shutdown"),
                SIGINT => info!("Received SIGINT, initiating graceful shutdown"),
                _ => continue,
            }
            let _ = shutdown_tx.send(());
            break;
        }
    });

    courier_echo::serve(listener, config, async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    handle.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io::Write;

    use super::*;

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind = \"0.0.0.0\"\nport = 8080").unwrap();
        let path = file.path().to_str().unwrap();

        let args = Args::parse_from(["courier-echo", "--config", path, "--port", "9000"]);
        let config = args.into_config().unwrap();

        assert_eq!(config.address(), "0.0.0.0:9000");
    }

    #[test]
    fn test_defaults_without_flags() {
        let config = Args::parse_from(["courier-echo"]).into_config().unwrap();
        assert_eq!(config, EchoConfig::default());
    }

    #[test]
    fn test_empty_bind_is_rejected() {
        let args = Args::parse_from(["courier-echo", "--bind", ""]);
        assert!(args.into_config().is_err());
    }
}
