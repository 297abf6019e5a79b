//! Development server: bundle middleware, static files and live reload.
//!
//! Bundle requests are answered by [`serve_bundles`]; everything else falls
//! through to the root directory. Browsers subscribe to
//! [`EVENTS_PATH`] to learn when a bundle was rebuilt.

use crate::config::ServerConfig;
use crate::error::{CliError, Result};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
    routing::get,
};
use devbundle::{BundleObserver, BundleOutcome, Bundler, ModuleName, serve_bundles};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};

/// Server-sent events endpoint for live reload.
pub const EVENTS_PATH: &str = "/__devbundle_events__";

const CLIENT_BUFFER: usize = 100;

/// Events pushed to live-reload clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DevEvent {
    /// A bundle was rebuilt successfully
    SourceUpdated { module: String },

    /// A bundle was rebuilt and failed
    BuildFailed { module: String, error: String },

    /// Client connected
    ClientConnected { id: usize },
}

/// Connected live-reload clients.
#[derive(Debug, Default)]
pub struct DevServerState {
    clients: RwLock<HashMap<usize, mpsc::Sender<String>>>,
    next_client_id: AtomicUsize,
}

impl DevServerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client and return its id and event receiver.
    pub fn register_client(&self) -> (usize, mpsc::Receiver<String>) {
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CLIENT_BUFFER);
        self.clients.write().insert(id, tx);
        (id, rx)
    }

    pub fn unregister_client(&self, id: usize) {
        self.clients.write().remove(&id);
    }

    /// Drop every client, ending their event streams.
    pub fn disconnect_all(&self) {
        self.clients.write().clear();
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Send an event to every client.
    ///
    /// Never blocks: clients whose buffer is full miss the event, closed
    /// clients are removed.
    pub fn broadcast(&self, event: &DevEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize dev event: {}", e);
                return;
            }
        };

        let clients = self.clients.read().clone();
        let mut closed = Vec::new();
        for (id, tx) in clients {
            match tx.try_send(json.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::debug!("Live-reload client {} is lagging, event dropped", id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(id),
            }
        }
        for id in closed {
            self.unregister_client(id);
        }
    }
}

/// Observer forwarding finished builds to live-reload clients.
pub struct LiveReload {
    state: Arc<DevServerState>,
}

impl LiveReload {
    pub fn new(state: Arc<DevServerState>) -> Self {
        Self { state }
    }
}

impl BundleObserver for LiveReload {
    fn new_source(&self, module: &ModuleName, outcome: &BundleOutcome) {
        let event = match outcome.error() {
            None => DevEvent::SourceUpdated {
                module: module.to_string(),
            },
            Some(error) => DevEvent::BuildFailed {
                module: module.to_string(),
                error: error.to_string(),
            },
        };
        self.state.broadcast(&event);
    }
}

/// Build the router: bundle middleware over live reload and static files.
pub fn build_router(bundler: &Bundler, state: Arc<DevServerState>, server: &ServerConfig) -> Router {
    let mut router = Router::new();
    if server.live_reload {
        router = router.route(EVENTS_PATH, get(handle_sse));
    }

    router = if server.serve_static {
        router.fallback_service(ServeDir::new(bundler.root()))
    } else {
        router.fallback(|| async { StatusCode::NOT_FOUND })
    };

    let mut app = router
        .with_state(state)
        .layer(from_fn_with_state(bundler.middleware(), serve_bundles));

    if server.cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }
    app
}

/// Run the server until Ctrl+C, then stop the bundler's watch sessions.
///
/// # Errors
///
/// Returns an error if the address is invalid or cannot be bound.
pub async fn start(bundler: Bundler, server: &ServerConfig) -> Result<()> {
    let addr = server.addr()?;
    let state = Arc::new(DevServerState::new());

    let subscription = server
        .live_reload
        .then(|| bundler.subscribe(Arc::new(LiveReload::new(Arc::clone(&state)))));

    let app = build_router(&bundler, Arc::clone(&state), server);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CliError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

    crate::ui::success(&format!(
        "Serving bundles from {} at {}",
        bundler.root().display(),
        server.url()
    ));

    let purge = spawn_purge(&bundler);

    let shutdown_state = Arc::clone(&state);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            crate::ui::info("Shutting down");
            // Open event streams would otherwise hold the server
            shutdown_state.disconnect_all();
        })
        .await;

    if let Some(task) = purge {
        task.abort();
    }
    if let Some(id) = subscription {
        bundler.unsubscribe(id);
    }
    bundler.shutdown();

    served.map_err(|e| CliError::Server(e.to_string()))
}

/// Periodically drop expired bundles when a cache TTL is configured.
fn spawn_purge(bundler: &Bundler) -> Option<tokio::task::JoinHandle<()>> {
    let ttl = bundler.config().cache_ttl()?;
    if !bundler.config().watch {
        return None;
    }
    let bundler = bundler.clone();
    let period = ttl.max(Duration::from_secs(1));
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            bundler.purge_expired();
        }
    }))
}

/// Handle SSE connections for live-reload events.
async fn handle_sse(
    State(state): State<Arc<DevServerState>>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let (id, rx) = state.register_client();
    tracing::debug!("Live-reload client {} connected", id);

    state.broadcast(&DevEvent::ClientConnected { id });

    let stream = ReceiverStream::new(rx).map(|data| Ok(Event::default().data(data)));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
