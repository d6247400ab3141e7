//! Server lifecycle: prepare the served directory, run the dispatcher
//! until Ctrl-C, then drain in-flight transfers.

use tokio_util::sync::CancellationToken;

use udpfetch_server::{Dispatcher, ServerConfig};

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    if !config.served_dir.exists() {
        tokio::fs::create_dir_all(&config.served_dir).await?;
        tracing::info!(path = %config.served_dir.display(), "created served directory");
    }

    let dispatcher = Dispatcher::bind(config).await?;
    let cancel = CancellationToken::new();

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received, shutting down");
                signal_cancel.cancel();
            }
            Err(e) => tracing::error!(error = %e, "failed to listen for interrupt"),
        }
    });

    dispatcher.run(cancel).await?;
    dispatcher.shutdown().await;
    Ok(())
}
