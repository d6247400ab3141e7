//! udpfetch client entry point.

mod app;
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Downloads a list of files from a udpfetch server.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Server host name or address.
    host: Option<String>,

    /// Server control port (1024-65535).
    port: Option<u16>,

    /// Text file listing one filename per line.
    files: Option<PathBuf>,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory downloads are written to.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Timeout of the first attempt, in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Sends per request before giving up.
    #[arg(long)]
    attempts: Option<u32>,
}

impl Cli {
    fn apply(&self, config: &mut config::Config) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(ms) = self.timeout_ms {
            config.initial_timeout_ms = ms;
        }
        if let Some(attempts) = self.attempts {
            config.max_attempts = attempts;
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,udpfetch=debug")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = config::Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    let files = cli.files.unwrap_or_else(|| PathBuf::from("files.txt"));

    let rt = tokio::runtime::Runtime::new()?;
    let all_succeeded = rt.block_on(app::run(config, files))?;

    Ok(if all_succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
