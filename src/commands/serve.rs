use anyhow::Result;
use tokio::sync::watch;

use prospector::config::Config;
use prospector::error::Error;
use prospector::metrics;
use prospector::server::{self, AppState};

/// Tick on an interval until Ctrl-C, serving /metrics and /health alongside
#[cfg(feature = "chromium")]
pub async fn serve(config: Config) -> Result<()> {
    use prospector::browser::chromium::ChromiumProvider;

    let scheduler = super::build_scheduler(&config).await?;
    let provider = ChromiumProvider::new(config.browser.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::new();

    let server_task = if config.metrics.enabled {
        Some(spawn_metrics_server(&config, state.clone(), shutdown_rx.clone()))
    } else {
        None
    };

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received, finishing current tick");
        }
        shutdown_tx.send(true).ok();
    });

    scheduler
        .run_periodic(&provider, shutdown_rx, |report| state.record_tick(report))
        .await;

    if let Some(task) = server_task {
        task.await??;
    }

    Ok(())
}

#[cfg(not(feature = "chromium"))]
pub async fn serve(_config: Config) -> Result<()> {
    anyhow::bail!("prospector was built without a browser adapter; rebuild with --features chromium")
}

#[cfg_attr(not(feature = "chromium"), allow(dead_code))]
fn spawn_metrics_server(
    config: &Config,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<prospector::Result<()>> {
    if let Err(e) = metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed, continuing without metrics");
    }

    let bind_address = config.metrics.bind_address.clone();
    tokio::spawn(async move {
        let signal = async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        };
        server::serve(&bind_address, state, signal)
            .await
            .map_err(Error::from)
    })
}
