use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use axum::{Router, http::HeaderValue, routing::get};
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::api::{self, AppState};
use super::db::{DbHandle, TrackerDb};
use super::ws;
use crate::config::{Config, DEFAULT_SECRET};
use crate::status::{Clock, FixedClock, SystemClock};

/// Configuration for the tracker server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub secret: String,
    pub cors_origins: Vec<String>,
    pub dev_mode: bool,
    /// Pinned calendar day; the host's local day when unset.
    pub today: Option<NaiveDate>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5001,
            db_path: PathBuf::from(".jobstatus/jobstatus.db"),
            secret: DEFAULT_SECRET.to_string(),
            cors_origins: Vec::new(),
            dev_mode: false,
            today: None,
        }
    }
}

impl From<&Config> for ServerConfig {
    fn from(config: &Config) -> Self {
        Self {
            host: config.server.host.clone(),
            port: config.server.port,
            db_path: config.server.db_path.clone(),
            secret: config.auth.secret.clone(),
            cors_origins: config.server.cors_origins.clone(),
            dev_mode: false,
            today: None,
        }
    }
}

impl ServerConfig {
    /// Permissive CORS with the stock secret is only allowed on loopback.
    pub fn check_exposure(&self) -> Result<()> {
        if self.dev_mode && self.secret == DEFAULT_SECRET && !is_loopback(&self.host) {
            anyhow::bail!(
                "Refusing to serve dev mode on {} with the default auth secret. \
                 Set JOBSTATUS_SECRET or bind to 127.0.0.1.",
                self.host
            );
        }
        Ok(())
    }
}

pub fn is_loopback(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost")
        || host
            .parse::<std::net::IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}

/// Build the full application router with the API and the change feed.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router(state.clone())
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Dev mode allows any origin; otherwise only the configured list.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.dev_mode {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Open the database at `config.db_path`, creating parent directories.
pub fn open_database(config: &ServerConfig) -> Result<TrackerDb> {
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
    }
    TrackerDb::new(&config.db_path).context("Failed to initialize tracker database")
}

/// Start the tracker server.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    config.check_exposure()?;
    let db = open_database(&config)?;
    let (ws_tx, _rx) = broadcast::channel::<String>(256);
    let clock: Arc<dyn Clock> = match config.today {
        Some(day) => {
            tracing::info!(today = %day, "calendar day pinned");
            Arc::new(FixedClock(day))
        }
        None => Arc::new(SystemClock),
    };

    let state = Arc::new(AppState {
        db: DbHandle::new(db),
        ws_tx,
        clock,
        secret: config.secret.clone(),
    });

    let app = build_router(state).layer(cors_layer(&config));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, db = %config.db_path.display(), dev = config.dev_mode, "server listening");
    println!("jobstatus API running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
