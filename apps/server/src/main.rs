//! udpfetch server entry point.

mod app;
mod config;

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Serves the files of one directory over the udpfetch protocol.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Control port (1024-65535).
    port: Option<u16>,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind.
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// Directory to serve; created if missing.
    #[arg(short = 'd', long)]
    served_dir: Option<PathBuf>,

    /// Let the OS choose data ports instead of probing the configured range.
    #[arg(long)]
    ephemeral_ports: bool,

    /// Seconds an idle transfer is kept alive.
    #[arg(long)]
    idle_timeout: Option<u64>,
}

impl Cli {
    fn apply(&self, config: &mut config::Config) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(dir) = &self.served_dir {
            config.served_dir = dir.clone();
        }
        if self.ephemeral_ports {
            config.data_ports.strategy = config::StrategyKind::Ephemeral;
        }
        if let Some(secs) = self.idle_timeout {
            config.idle_timeout_secs = secs;
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,udpfetch=debug")),
        )
        .init();

    let cli = Cli::parse();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting udpfetch server"
    );

    let mut config = config::Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    let server_config = config.to_server_config()?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(server_config))?;

    tracing::info!("server shut down cleanly");
    Ok(())
}
