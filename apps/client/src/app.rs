//! Client run: resolve the server, read the file list, download each file
//! and log a summary.

use std::path::PathBuf;

use anyhow::Context;

use udpfetch_client::{BatchReport, Requester, RequesterConfig, read_file_list};
use udpfetch_transfer::Outcome;

use crate::config::Config;

/// Returns whether every listed file was downloaded.
pub async fn run(config: Config, files: PathBuf) -> anyhow::Result<bool> {
    let server_addr = tokio::net::lookup_host((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("resolving {}", config.host))?
        .next()
        .with_context(|| format!("no address found for {}", config.host))?;

    let names = read_file_list(&files)
        .await
        .with_context(|| format!("reading file list {}", files.display()))?;
    if names.is_empty() {
        tracing::warn!(list = %files.display(), "file list is empty, nothing to download");
        return Ok(true);
    }

    if !config.output_dir.exists() {
        tokio::fs::create_dir_all(&config.output_dir).await?;
        tracing::info!(path = %config.output_dir.display(), "created output directory");
    }

    let mut requester_config = RequesterConfig::new(server_addr, &config.output_dir);
    requester_config.retry = config.retry_policy();
    requester_config.max_chunk = config.max_chunk;

    tracing::info!(server = %server_addr, files = names.len(), "starting downloads");
    let requester = Requester::bind(requester_config).await?;
    let report = requester.download_batch(&names).await;

    log_summary(&report);
    Ok(report.all_succeeded())
}

fn log_summary(report: &BatchReport) {
    for entry in &report.entries {
        match &entry.result {
            Ok(r) => tracing::info!(
                file = %entry.filename,
                bytes = r.bytes_written,
                sha256 = %r.sha256,
                elapsed_ms = r.elapsed.as_millis() as u64,
                "ok"
            ),
            Err(e) => tracing::warn!(
                file = %entry.filename,
                outcome = ?entry.outcome(),
                error = %e,
                "failed"
            ),
        }
    }
    tracing::info!(
        succeeded = report.count(Outcome::Success),
        incomplete = report.count(Outcome::Incomplete),
        aborted = report.count(Outcome::Aborted),
        bytes = report.bytes_written(),
        "all downloads finished"
    );
}
