pub mod bootstrap;
pub mod chat;
pub mod health;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chatrelay_core::config::{AppConfig, LoadOptions};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::session::SessionStore;

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub fn init_logging(config: &AppConfig) {
    use chatrelay_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    let drain_deadline = Duration::from_secs(app.config.server.graceful_shutdown_secs);

    let sweeper = spawn_session_sweeper(
        app.chat.sessions.clone(),
        Duration::from_secs(app.config.session.idle_ttl_secs),
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let router = app.router();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .await
    });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "chatrelay-server started"
    );

    tokio::select! {
        joined = &mut server => {
            sweeper.abort();
            joined??;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => signal?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        drain_deadline_secs = drain_deadline.as_secs(),
        "chatrelay-server stopping"
    );
    let _ = shutdown_tx.send(true);
    sweeper.abort();

    match tokio::time::timeout(drain_deadline, server).await {
        Ok(joined) => joined??,
        Err(_) => tracing::warn!(
            event_name = "system.server.drain_timeout",
            correlation_id = "shutdown",
            "in-flight requests did not finish before the drain deadline"
        ),
    }

    Ok(())
}

/// Periodically drops idle sessions so abandoned ones do not wait for a full store.
fn spawn_session_sweeper(sessions: Arc<dyn SessionStore>, idle_ttl: Duration) -> JoinHandle<()> {
    let period = idle_ttl.min(MAX_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match sessions.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(
                    event_name = "session.store.purged",
                    correlation_id = "session_sweeper",
                    removed,
                    "expired sessions purged"
                ),
                Err(error) => tracing::warn!(
                    event_name = "session.store.purge_failed",
                    correlation_id = "session_sweeper",
                    error = %error,
                    "expired session purge failed"
                ),
            }
        }
    })
}
