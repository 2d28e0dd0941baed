mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use thaw_api::auth::{self, AppState, AppStateInner};
use thaw_api::middleware::require_auth;
use thaw_api::{channels, messages};
use thaw_core::AccessEngine;
use thaw_db::Database;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "thaw=debug,thaw_core=debug,thaw_api=debug,tower_http=debug".into()
            }),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    // Init database and the live channel registry
    let db = Arc::new(Database::open(&config.db_path, config.reader_pool)?);
    let engine = AccessEngine::new(db);
    engine.load()?;

    let state: AppState = Arc::new(AppStateInner {
        engine,
        jwt_secret: config.jwt_secret.clone(),
        default_channel: config.default_channel.clone(),
    });

    // Routes
    let public_routes = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/api/private/logout", post(auth::logout))
        .route(
            "/api/private/channels",
            get(channels::list_channels).post(channels::create_channel),
        )
        .route("/api/private/channels/{name}", delete(channels::delete_channel))
        .route("/api/private/channels/{name}/connect", post(channels::connect))
        .route("/api/private/channels/{name}/participants", get(channels::participants))
        .route("/api/private/channels/{name}/members", post(channels::grant_access))
        .route(
            "/api/private/channels/{name}/members/{member}",
            delete(channels::revoke_access),
        )
        .route(
            "/api/private/channels/{name}/messages",
            get(messages::get_messages).post(messages::send_message),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Thaw server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {}", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
