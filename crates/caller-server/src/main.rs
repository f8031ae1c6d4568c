//! Voice-assistant server binary.
//!
//! Starts an axum HTTP server with structured logging, the idle-session
//! sweeper, and graceful shutdown on SIGTERM/SIGINT.

use caller_server::{app, background, config, orchestrator, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("CALLER_CONFIG_PATH") {
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

    if !config.openai.is_enabled() {
        tracing::warn!("OPENAI_API_KEY is not set; every reply will fail");
    }
    if config.elevenlabs.api_key.is_empty() {
        tracing::info!("ELEVENLABS_API_KEY is not set; replies use Twilio <Say>");
    }
    if config.twilio.validate_signatures && config.twilio.auth_token.is_empty() {
        tracing::warn!("signature validation is on but TWILIO_AUTH_TOKEN is empty; all webhooks will be rejected");
    }

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let public_url = config.server.public_url.clone();

    let state = AppState::new(config)
        .await
        .expect("failed to initialize services; check audio_dir and API settings");

    let stale = background::remove_orphan_clips(&state, Duration::ZERO).await;
    if stale > 0 {
        tracing::info!(count = stale, "removed audio clips left by a previous run");
    }

    {
        let state = state.clone();
        tokio::spawn(async move { orchestrator::warm_greeting(&state).await });
    }
    tokio::spawn(background::start_session_sweeper(Arc::new(state.clone())));

    let app = app(state.clone());

    tracing::info!(%addr, public_url = %public_url, "starting caller server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address; is another process using this port?");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    if let Some(clip) = state.greeting_clip() {
        if let Err(e) = state.audio.remove(&clip).await {
            tracing::warn!(error = %e, "failed to remove greeting clip");
        }
    }

    tracing::info!("caller server shut down");
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
