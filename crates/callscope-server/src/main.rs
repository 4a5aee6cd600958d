//! CallScope Server: Application entry point.

use std::sync::Arc;

use callscope_analytics::JobScheduler;
use callscope_auth::AnyMailer;
use callscope_db::{DbManager, run_migrations};
use callscope_server::config::AppConfig;
use callscope_server::router;
use callscope_server::state::AppState;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("callscope=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .init();

    info!("Starting CallScope server...");

    if let Err(e) = run().await {
        error!(error = %e, "CallScope server failed");
        std::process::exit(1);
    }

    info!("CallScope server stopped.");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    if config.auth.jwt_secret.is_empty() {
        return Err("auth.jwt_secret must be configured".into());
    }

    let db = DbManager::connect(&config.database).await?;
    run_migrations(db.client()).await?;

    let mailer = AnyMailer::from_config(config.smtp.as_ref())?;
    let state = AppState::new(
        db.client().clone(),
        config.auth.clone(),
        mailer,
        &config.metrics_job,
    )?;

    let mut scheduler = JobScheduler::new(&config.metrics_job.schedule)?
        .with_offset(config.metrics_job.offset()?);
    if config.metrics_job.enabled {
        scheduler.start(Arc::new(state.metrics_job()))?;
    }

    let address = config.server.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!(address = %address, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}
