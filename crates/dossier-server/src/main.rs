//! Dossier server binary.
//!
//! Starts an axum HTTP server with structured logging, database
//! initialization, the notification and audit background workers, and
//! graceful shutdown on SIGTERM/SIGINT.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dossier_appointments::AppointmentEngine;
use dossier_server::background::{
    run_audit_writer, run_notification_worker, ChannelAuditSink, ChannelDispatcher,
};
use dossier_server::{app, config, AppState};
use dossier_types::NoDirectory;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// How long shutdown waits for queued notifications and audit records.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("DOSSIER_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration; the server cannot start without valid config");

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let pool = dossier_db::create_pool(
        &config.database.path,
        dossier_db::DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )
    .expect("failed to create database pool; check database.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied =
            dossier_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
    }

    let (dispatcher, notifications) =
        ChannelDispatcher::channel(config.notifications.queue_capacity);
    let (audit_sink, audit_records) = ChannelAuditSink::channel(config.audit.queue_capacity);

    let notification_worker = tokio::spawn(run_notification_worker(notifications));
    let audit_writer = tokio::spawn(run_audit_writer(pool.clone(), audit_records));

    let state = AppState {
        pool,
        engine: AppointmentEngine::new(Arc::new(dispatcher)),
        audit: Arc::new(audit_sink),
        directory: Arc::new(NoDirectory),
    };

    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting dossier server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address; is another process using this port?");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // The router (and with it every sender) is gone; let the workers drain.
    let drain = async {
        if let Err(e) = notification_worker.await {
            tracing::error!("notification worker join error: {}", e);
        }
        if let Err(e) = audit_writer.await {
            tracing::error!("audit writer join error: {}", e);
        }
    };
    if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        tracing::warn!("background queues not drained before shutdown");
    }

    tracing::info!("dossier server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
