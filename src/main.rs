use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use reel_api::config::{Environment, ServerArgs};
use reel_api::database::{manager, MemoryStore, PgStore, SharedStore};
use reel_api::mailer::LogMailer;
use reel_api::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL and friends are picked up locally
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: failed to load .env file: {}", e);
        }
    }

    let args = ServerArgs::parse();
    let memory_store = args.memory_store;
    let config = args.into_config();

    init_tracing(config.environment);
    info!(
        environment = %config.environment,
        port = config.port,
        limiter_enabled = config.limiter.enabled,
        "starting reel-api"
    );

    let store: SharedStore = if memory_store || config.database.url.is_none() {
        warn!("no database configured, using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let pool = manager::connect(&config.database)
            .await
            .context("failed to connect to database")?;
        manager::migrate(&pool).await.context("failed to run migrations")?;
        Arc::new(PgStore::new(pool, config.database.query_timeout()))
    };

    let port = config.port;
    let cleanup_interval = config.limiter.cleanup_interval();
    let state = AppState::new(config, store, Arc::new(LogMailer));
    let sweeper = state.limiter.spawn_sweeper(cleanup_interval);

    let app = reel_api::app(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("completing background tasks");
    sweeper.shutdown().await;
    state.background.close();
    state.background.wait().await;

    info!("stopped server");
    Ok(())
}

/// Pretty output while developing, JSON lines everywhere else.
fn init_tracing(environment: Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reel_api=info,tower_http=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match environment {
        Environment::Development => builder.init(),
        Environment::Staging | Environment::Production => builder.json().init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
