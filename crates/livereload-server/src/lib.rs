//! LiveReload notification server.
//!
//! This crate provides a LiveReload-compatible server on axum, serving:
//! - The browser client script (`livereload.js`) over plain HTTP
//! - A WebSocket endpoint where browsers stay connected as sessions
//! - `reload` and `alert` broadcasts to every open session
//!
//! # Quick Start
//!
//! ```ignore
//! use livereload_server::{LiveReloadServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let script = std::fs::read("node_modules/livereload-js/dist/livereload.js").unwrap();
//!     let server = LiveReloadServer::new(ServerConfig::default(), script).unwrap();
//!
//!     server.listen().await.unwrap();
//!     server.reload("css/main.css");
//!     server.close().await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum router (livereload-server)
//!                        │
//!                        ├─► GET /livereload.js ──► client script bytes
//!                        │
//!                        ├─► /livereload (upgrade) ──► session task ◄──► Hub
//!                        │                                              ▲
//!                        │                        FileWatcher (notify) ─┘
//!                        │
//!                        └─► anything else ──► 404
//! ```

mod app;
mod error;
mod live_reload;
mod state;
mod static_files;

use std::borrow::Cow;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub use error::ServerError;
pub use live_reload::{FileWatcher, Hub, OutboundCommand, PROTOCOLS, SessionId, WatchOptions};
use state::AppState;

/// Server name announced to clients by default.
pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on (0 picks a free port).
    pub port: u16,
    /// `serverName` stamped into every outbound frame.
    pub server_name: String,
    /// Path at which WebSocket upgrades are accepted.
    pub upgrade_path: String,
    /// Path at which the client script is served.
    pub script_path: String,
    /// Client script file (`None` uses the bundled script).
    pub script_file: Option<PathBuf>,
    /// File watching (`None` disables it).
    pub watch: Option<WatchOptions>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: livereload_config::DEFAULT_PORT,
            server_name: SERVER_NAME.to_owned(),
            upgrade_path: "/livereload".to_owned(),
            script_path: "/livereload.js".to_owned(),
            script_file: None,
            watch: None,
        }
    }
}

/// Listener that is currently running.
struct Listening {
    addr: SocketAddr,
    task: JoinHandle<std::io::Result<()>>,
}

/// A LiveReload server instance.
///
/// Instances are independent: several can run in one process on different
/// ports.
pub struct LiveReloadServer {
    config: ServerConfig,
    hub: Arc<Hub>,
    router: Router,
    listening: Mutex<Option<Listening>>,
}

impl LiveReloadServer {
    /// Create a server that serves `script` as the client script.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidRoute`] if a route does not start with `/`
    /// or both routes are the same.
    pub fn new(config: ServerConfig, script: impl Into<Bytes>) -> Result<Self, ServerError> {
        for route in [&config.upgrade_path, &config.script_path] {
            if !route.starts_with('/') {
                return Err(ServerError::InvalidRoute(route.clone()));
            }
        }
        if config.upgrade_path == config.script_path {
            return Err(ServerError::InvalidRoute(config.upgrade_path.clone()));
        }

        let hub = Arc::new(Hub::new(config.server_name.clone()));
        let state = Arc::new(AppState {
            hub: Arc::clone(&hub),
            script: script.into(),
            script_path: config.script_path.clone(),
            script_mime: livereload_assets::mime_for(livereload_assets::SCRIPT_NAME),
        });
        let router = app::create_router(state, &config.upgrade_path);

        Ok(Self {
            config,
            hub,
            router,
            listening: Mutex::new(None),
        })
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The session hub.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// The axum router, for serving on a custom listener or in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Address the server is bound to, if listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_listening().as_ref().map(|l| l.addr)
    }

    /// Broadcast a `reload` for `path`. Returns the number of recipients.
    pub fn reload(&self, path: &str) -> usize {
        self.hub.reload(path)
    }

    /// Broadcast an `alert`. Returns the number of recipients.
    pub fn alert(&self, message: &str) -> usize {
        self.hub.alert(message)
    }

    /// Bind the listener and start serving in the background.
    ///
    /// Completes once the socket is bound and returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound and
    /// [`ServerError::AlreadyListening`] if the server is already running.
    pub async fn listen(&self) -> Result<SocketAddr, ServerError> {
        if self.lock_listening().is_some() {
            return Err(ServerError::AlreadyListening);
        }

        let host = self.config.host.as_str();
        let listener = TcpListener::bind((host, self.config.port))
            .await
            .map_err(|source| ServerError::Bind {
                address: format!("{host}:{}", self.config.port),
                source,
            })?;
        let addr = listener.local_addr()?;

        let mut listening = self.lock_listening();
        if listening.is_some() {
            return Err(ServerError::AlreadyListening);
        }

        self.hub.reset_shutdown();
        let mut shutdown = self.hub.shutdown_signal();
        let app = self.router.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.wait_for(|closing| *closing).await;
                })
                .await
        });
        *listening = Some(Listening { addr, task });

        tracing::info!(address = %addr, "LiveReload server listening");
        Ok(addr)
    }

    /// Stop listening and close every open session.
    ///
    /// Completes once the listener is released and no session is left.
    /// Closing a server that is not listening is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener task failed.
    pub async fn close(&self) -> Result<(), ServerError> {
        let Some(Listening { addr, task }) = self.lock_listening().take() else {
            return Ok(());
        };

        self.hub.begin_shutdown();
        task.await??;
        self.hub.wait_empty().await;

        tracing::info!(address = %addr, "LiveReload server closed");
        Ok(())
    }

    fn lock_listening(&self) -> MutexGuard<'_, Option<Listening>> {
        self.listening.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for LiveReloadServer {
    fn drop(&mut self) {
        // Stops the listener and session tasks of a server that was never closed
        self.hub.begin_shutdown();
    }
}

/// Run the server until Ctrl-C.
///
/// Loads the client script, starts listening, starts the file watcher if
/// configured, and closes everything on shutdown.
///
/// # Errors
///
/// Returns an error if the script cannot be loaded, the listener cannot be
/// bound, or the watcher fails to start.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let script = match livereload_assets::load_client_script(config.script_file.as_deref())? {
        Cow::Borrowed(bytes) => Bytes::from_static(bytes),
        Cow::Owned(bytes) => Bytes::from(bytes),
    };
    tracing::info!(bytes = script.len(), "Loaded client script");

    let server = LiveReloadServer::new(config, script)?;
    server.listen().await?;

    let _watcher = match &server.config().watch {
        Some(options) => {
            let mut watcher = FileWatcher::new(options.clone(), Arc::clone(server.hub()));
            watcher.start()?;
            Some(watcher)
        }
        None => None,
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping server...");

    server.close().await
}

/// Create server configuration from LiveReload config.
///
/// # Arguments
///
/// * `config` - Loaded configuration
#[must_use]
pub fn server_config_from_config(config: &livereload_config::Config) -> ServerConfig {
    let watch = &config.watch_resolved;

    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        server_name: config.server_name().unwrap_or(SERVER_NAME).to_owned(),
        upgrade_path: config.routes.upgrade_path.clone(),
        script_path: config.routes.script_path.clone(),
        script_file: config.client_resolved.script.clone(),
        watch: watch.enabled.then(|| WatchOptions {
            dir: watch.dir.clone(),
            patterns: watch.patterns.clone(),
            debounce: Duration::from_millis(watch.debounce_ms),
        }),
    }
}
