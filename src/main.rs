use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use coltech_api::cli::Cli;
use coltech_api::config::{AppConfig, LogFormat};
use coltech_api::database::{manager, MemoryStore, Models};
use coltech_api::lifecycle::{signals, ShutdownCoordinator};
use coltech_api::middleware::{RateLimitConfig, RateLimiter};
use coltech_api::services::LogMailer;
use coltech_api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up COLTECH_DB_DSN, APP_ENV, etc.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = cli.apply(AppConfig::from_env());
    config.validate().context("invalid configuration")?;

    init_tracing(config.logging.format);
    tracing::info!(environment = config.environment.as_str(), "starting coltech api");

    let operation_timeout = config.database.operation_timeout();
    let models = if cli.in_memory {
        tracing::warn!("using the in-memory store; nothing will be persisted");
        Models::in_memory(MemoryStore::new(), operation_timeout)
    } else {
        let pool = manager::connect(&config.database)
            .await
            .context("failed to connect to the database")?;
        manager::migrate(&pool)
            .await
            .context("failed to run database migrations")?;
        Models::postgres(pool, operation_timeout)
    };

    let config = Arc::new(config);
    let coordinator = ShutdownCoordinator::new(config.shutdown.grace_period());

    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::from(&config.limiter)));
    if limiter.enabled() {
        limiter.spawn_sweeper(&coordinator.tasks(), coordinator.token());
    }

    let state = AppState {
        config: config.clone(),
        models,
        mailer: Arc::new(LogMailer),
        background: coordinator.tasks(),
    };
    let app = build_app(state, limiter);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    let trigger = coordinator.clone();
    tokio::spawn(async move {
        match signals::wait_for_termination().await {
            Ok(signal) => {
                tracing::info!(signal, "caught signal");
                trigger.trigger();
            }
            Err(err) => tracing::error!(error = %err, "failed to install signal handlers"),
        }
    });

    coordinator
        .serve(listener, app)
        .await
        .context("server did not shut down cleanly")?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}
