use anyhow::Result;
use axum::Router;
use deepcrew_api::{config::AppConfig, routes, state::AppState};
use deepcrew_core::{ConfigLoader, TelemetryOptions, init_telemetry, metrics};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let pipeline = ConfigLoader::load(None)?;
    init_telemetry(TelemetryOptions::with_default_level(&pipeline.logging.level))?;
    metrics::init_metrics_from_env("deepcrew-api");

    let config = AppConfig::from_env()?;
    let state = AppState::try_new(&config, &pipeline)?;

    let app: Router = routes::build_router(state);

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!(
        address = %config.listen_addr,
        model = %pipeline.llm.model,
        timeout_secs = config.query_timeout.map(|limit| limit.as_secs()),
        "deepcrew-api listening"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| {
            error!(error = %err, "server shutdown with error");
            err
        })?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            stream.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
