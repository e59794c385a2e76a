//! HTTP transport with server-sent events
//!
//! ```text
//! GET  /sse                       -> event stream, first event `endpoint`
//! POST /messages?session_id=<id>  -> 202, reply pushed as `message` event
//! GET  /health                    -> "OK"
//! ```
//!
//! Each open event stream is one session. Sessions are independent and
//! vanish when the client disconnects.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::{self, Stream, StreamExt};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::handler::McpHandler;

const SESSION_BUFFER: usize = 32;

pub struct SseState {
    handler: Arc<McpHandler>,
    sessions: RwLock<HashMap<Uuid, mpsc::Sender<Value>>>,
}

impl SseState {
    pub fn new(handler: Arc<McpHandler>) -> Self {
        Self {
            handler,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn open_session(&self) -> (Uuid, mpsc::Receiver<Value>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        self.sessions.write().insert(id, tx);
        (id, rx)
    }

    fn session(&self, id: &Uuid) -> Option<mpsc::Sender<Value>> {
        self.sessions.read().get(id).cloned()
    }
}

/// Removes the session once its event stream is dropped
struct SessionGuard {
    state: Arc<SseState>,
    id: Uuid,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.state.sessions.write().remove(&self.id);
        debug!(session = %self.id, "Session closed");
    }
}

pub async fn health_check() -> &'static str {
    "OK"
}

async fn open_stream(
    State(state): State<Arc<SseState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (id, rx) = state.open_session();
    info!(session = %id, "Session opened");

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/messages?session_id={}", id.simple()));
    let guard = SessionGuard { state, id };

    let messages = ReceiverStream::new(rx).map(move |message| {
        let _session = &guard;
        Ok::<_, Infallible>(Event::default().event("message").data(message.to_string()))
    });

    let stream = stream::once(async move { Ok::<_, Infallible>(endpoint) }).chain(messages);
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    session_id: String,
}

async fn post_message(
    State(state): State<Arc<SseState>>,
    Query(query): Query<SessionQuery>,
    body: String,
) -> (StatusCode, &'static str) {
    let Ok(id) = Uuid::parse_str(&query.session_id) else {
        return (StatusCode::BAD_REQUEST, "Invalid session ID");
    };
    let Some(sender) = state.session(&id) else {
        warn!(session = %id, "Message for unknown session");
        return (StatusCode::NOT_FOUND, "Could not find session");
    };

    let handler = state.handler.clone();
    tokio::spawn(async move {
        if let Some(reply) = handler.handle_message(&body).await {
            if sender.send(reply).await.is_err() {
                debug!(session = %id, "Session closed before reply was delivered");
            }
        }
    });

    (StatusCode::ACCEPTED, "Accepted")
}

pub fn router(handler: Arc<McpHandler>) -> Router {
    let state = Arc::new(SseState::new(handler));

    Router::new()
        .route("/health", get(health_check))
        .route("/sse", get(open_stream))
        .route("/messages", post(post_message))
        .route("/messages/", post(post_message))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn run_sse(handler: Arc<McpHandler>, addr: &str) -> std::io::Result<()> {
    let app = router(handler);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("╔══════════════════════════════════════════════════════════════╗");
    info!("║              Testing Farm MCP Server (HTTP/SSE)              ║");
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!("║  Listening on: {:45} ║", addr);
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!("║  Endpoints:                                                  ║");
    info!("║    GET  /health    - Health check                            ║");
    info!("║    GET  /sse       - Open an MCP session (event stream)      ║");
    info!("║    POST /messages  - Send a JSON-RPC message to a session    ║");
    info!("╚══════════════════════════════════════════════════════════════╝");

    axum::serve(listener, app).await
}
