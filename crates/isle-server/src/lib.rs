//! Development server for isle.
//!
//! Serves the build output directory over HTTP and keeps browsers in sync:
//!
//! - Static files from the output directory, guarded against traversal
//! - A server-sent events endpoint that emits `reload` whenever the output
//!   directory settles after a change
//! - Hot mode: source changes re-run the incremental build, one build at a
//!   time, with concurrent triggers folded into a single queued re-run
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum router (isle-server)
//!                        │
//!                        ├─► Static files (output directory)
//!                        │
//!                        └─► Event stream ◄── LiveReloadManager ◄── notify (output dir)
//!
//! notify (sources) ──► debounce ──► BuildGate ──► SiteBuilder::build (blocking pool)
//! ```

mod app;
mod error;
mod hot;
mod live_reload;
mod middleware;
mod state;
mod static_files;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use isle_build::SiteBuilder;
use isle_config::Config;

pub use error::ServerError;
use hot::HotSettings;
use live_reload::LiveReloadManager;
use state::AppState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Directory served as the site root.
    pub out_dir: PathBuf,
    /// Enable live reload.
    pub live_reload_enabled: bool,
    /// Event stream endpoint path.
    pub live_reload_path: String,
    /// Quiet period before a burst of output writes becomes a reload.
    pub live_reload_debounce: Duration,
    /// Rebuild on source changes.
    pub hot: bool,
    /// Source directory watched in hot mode.
    pub source_dir: PathBuf,
    /// Page directory, watched too when it lies outside `source_dir`.
    pub pages_dir: PathBuf,
    /// Dependency packages watched in hot mode when present.
    pub watch_packages: Vec<PathBuf>,
    /// Paths never treated as source changes.
    pub ignored: Vec<PathBuf>,
    /// Quiet period before source changes trigger a rebuild.
    pub hot_debounce: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 4173,
            out_dir: PathBuf::from("dist"),
            live_reload_enabled: true,
            live_reload_path: "/__isle/reload".to_owned(),
            live_reload_debounce: Duration::from_millis(100),
            hot: false,
            source_dir: PathBuf::from("src"),
            pages_dir: PathBuf::from("src/pages"),
            watch_packages: Vec::new(),
            ignored: Vec::new(),
            hot_debounce: Duration::from_millis(150),
        }
    }
}

/// Create server configuration from isle config.
#[must_use]
pub fn server_config_from_isle_config(config: &Config, hot: bool) -> ServerConfig {
    let project = &config.project_resolved;
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        out_dir: project.out_dir.clone(),
        live_reload_enabled: config.live_reload.enabled,
        live_reload_path: config.live_reload.path.clone(),
        live_reload_debounce: Duration::from_millis(config.live_reload.debounce_ms),
        hot,
        source_dir: project.source_dir.clone(),
        pages_dir: project.pages_dir.clone(),
        watch_packages: config.hot_resolved.watch_packages.clone(),
        ignored: vec![project.out_dir.clone(), project.cache_file.clone()],
        hot_debounce: Duration::from_millis(config.hot_resolved.debounce_ms),
    }
}

/// Run the server until Ctrl-C.
///
/// `builder` is only used in hot mode; the caller performs the initial build.
///
/// # Errors
///
/// Returns an error if the output directory cannot be prepared, a watcher
/// cannot be started, or the listener cannot be bound.
pub async fn run_server(
    config: ServerConfig,
    builder: Arc<SiteBuilder>,
) -> Result<(), ServerError> {
    tokio::fs::create_dir_all(&config.out_dir).await?;
    let root = tokio::fs::canonicalize(&config.out_dir).await?;

    // Create live reload manager if enabled
    let live_reload = if config.live_reload_enabled {
        let manager = Arc::new(LiveReloadManager::new(config.live_reload_path.clone()));
        manager.start(root.clone(), config.live_reload_debounce)?;
        Some(manager)
    } else {
        None
    };

    // Held for the lifetime of the server.
    let _hot_watcher = if config.hot {
        let settings = HotSettings {
            source_dir: config.source_dir.clone(),
            pages_dir: config.pages_dir.clone(),
            watch_packages: config.watch_packages.clone(),
            ignored: config.ignored.clone(),
            debounce: config.hot_debounce,
        };
        Some(hot::start(builder, &settings)?)
    } else {
        None
    };

    let state = Arc::new(AppState { root, live_reload });
    let app = app::create_router(state);

    let addr_text = format!("{}:{}", config.host, config.port);
    let addr: SocketAddr = addr_text
        .parse()
        .map_err(|_| ServerError::Address(addr_text.clone()))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr_text,
            source,
        })?;
    tracing::info!(address = %addr, hot = config.hot, "Serving output directory");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}
