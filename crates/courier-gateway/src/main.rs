use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use courier_core::config::CourierConfig;
use courier_scheduler::{CivilClock, Clock, SchedulerEngine};
use courier_store::JobStore;
use courier_transfer::{SftpClient, TransferClient};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

mod app;
mod http;
mod storage;

/// Scheduled SFTP delivery service.
#[derive(Debug, Parser)]
#[command(name = "courier-gateway", version, about)]
struct Args {
    /// Path to courier.toml (overrides COURIER_CONFIG).
    #[arg(long)]
    config: Option<String>,

    /// Listen port (overrides config and PORT).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "courier_gateway=info,courier_scheduler=info,courier_transfer=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let args = Args::parse();

    // load config: --config > COURIER_CONFIG env > ~/.courier/courier.toml
    let config_path = args.config.or_else(|| std::env::var("COURIER_CONFIG").ok());
    let mut config = CourierConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        CourierConfig::default()
    });
    if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
        config.gateway.port = port;
    }
    if let Some(port) = args.port {
        config.gateway.port = port;
    }

    let civil_offset = config.scheduler.civil_offset()?;
    let clock: Arc<dyn Clock> = Arc::new(CivilClock::new(civil_offset));
    info!(offset = %civil_offset, now = %clock.now(), "civil clock ready");

    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");
    let db = rusqlite::Connection::open(&db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    let store = Arc::new(JobStore::new(db)?);

    let uploads = storage::UploadStorage::new(&config.storage.upload_dir)?;
    info!(dir = %uploads.dir().display(), "upload storage ready");

    let transfer: Arc<dyn TransferClient> = Arc::new(SftpClient::new(
        config.transfer.port,
        Duration::from_secs(config.transfer.connect_timeout_secs),
    ));

    let engine = SchedulerEngine::new(
        Arc::clone(&store),
        transfer,
        Arc::clone(&clock),
        Duration::from_secs(config.scheduler.tick_interval_secs),
    )?;
    let running = engine.start();

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(
        config,
        store,
        running.handle(),
        uploads,
        clock,
        civil_offset,
    ));
    let router = app::build_router(state);

    info!("Courier gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // let an in-flight delivery pass finish before exiting
    running.stop().await;
    Ok(())
}

/// Resolves on SIGTERM or SIGINT.
async fn shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!("failed to install SIGTERM handler: {e}");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT, initiating graceful shutdown"),
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
