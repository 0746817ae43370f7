use anyhow::{Context, Result};
use clap::Parser;
use guardiand::{router, AppState, DaemonConfig};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so clap's env fallbacks can see it
    dotenvy::dotenv().ok();
    let config = DaemonConfig::parse();

    let level = if config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    guardian_core::init_tracing(config.log_json, level);

    let addr = config.bind_addr()?;
    let orchestrator = config.build_orchestrator()?;
    let app = router(AppState::new(orchestrator));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        addr = %addr,
        work_dir = %config.work_dir.display(),
        version = guardian_core::VERSION,
        "guardiand listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
