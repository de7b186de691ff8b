use anyhow::Context;
use tracing::{error, info};

use cook_api::app::{build_app, services::build_persistent_services};
use cook_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cook_observability::init();

    let config = AppConfig::from_env().context("loading configuration")?;
    let runtime = build_persistent_services(&config).await?;

    let app = build_app(runtime.services);

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http_addr))?;

    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    for worker in runtime.workers {
        let name = worker.name().to_string();
        if let Err(err) = worker.shutdown().await {
            error!(worker = %name, error = %err, "worker stopped with error");
        }
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
