//! WebSocket transport: routes, connection workers and the expiry sweeper.

use crate::config::ServerConfig;
use crate::connection::{ConnectionHandle, Outbox, Outgoing};
use crate::protocol::{ResultTag, ServerMessage};
use crate::registry::MatchRegistry;
use crate::session::{ConnectRequest, Session};
use anyhow::Result;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Path, Request, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower::ServiceBuilder;
use tracing::{debug, info, instrument, warn};

/// State shared by every route.
#[derive(Debug, Clone)]
struct AppState {
    registry: MatchRegistry,
    outbound_buffer: usize,
}

/// Match server bound to one configuration and one registry.
#[derive(Debug, Clone)]
pub struct GameServer {
    config: ServerConfig,
    registry: MatchRegistry,
}

impl GameServer {
    /// Creates a server with a fresh registry.
    #[instrument(skip(config))]
    pub fn new(config: ServerConfig) -> Self {
        let registry = MatchRegistry::new().with_waiting_timeout(config.waiting_timeout());
        Self::with_registry(config, registry)
    }

    /// Creates a server around an existing registry.
    pub fn with_registry(config: ServerConfig, registry: MatchRegistry) -> Self {
        Self { config, registry }
    }

    /// Registry shared by all connections.
    pub fn registry(&self) -> &MatchRegistry {
        &self.registry
    }

    /// Builds the HTTP router.
    ///
    /// - `GET /health`
    /// - `GET /xo-game/{player_name}` (or with a trailing slash) creates a match
    /// - `GET /xo-game/{player_name}/{match_id}` joins one
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            outbound_buffer: *self.config.outbound_buffer(),
        };
        Router::new()
            .route("/health", get(health))
            .route("/xo-game/{player_name}", get(create_match))
            .route("/xo-game/{player_name}/", get(create_match))
            .route("/xo-game/{player_name}/{match_id}", get(join_match))
            .layer(ServiceBuilder::new().map_request(|req: Request| {
                debug!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
                req
            }))
            .with_state(state)
    }

    /// Binds the configured address and serves until Ctrl-C.
    pub async fn serve(self) -> Result<()> {
        let address = self.config.bind_address();
        let listener = TcpListener::bind(&address).await?;
        info!(%address, "Listening");
        self.serve_on(listener, shutdown_signal()).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    pub async fn serve_on(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let sweeper = self
            .config
            .waiting_timeout()
            .map(|_| spawn_sweeper(self.registry.clone(), self.config.sweep_interval()));

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await;

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }
        info!(live_matches = self.registry.len(), "Server stopped");
        Ok(result?)
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
    }
}

fn spawn_sweeper(registry: MatchRegistry, period: Duration) -> JoinHandle<()> {
    debug!(?period, "Starting expiry sweeper");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let expired = registry.sweep_expired(Instant::now());
            if !expired.is_empty() {
                debug!(?expired, "Expired waiting matches");
            }
        }
    })
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "matches": state.registry.len(),
    }))
}

async fn create_match(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(player_name): Path<String>,
) -> Response {
    upgrade(ws, state, ConnectRequest::new(player_name, None::<String>))
}

async fn join_match(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path((player_name, match_id)): Path<(String, String)>,
) -> Response {
    upgrade(ws, state, ConnectRequest::new(player_name, Some(match_id)))
}

fn upgrade(ws: WebSocketUpgrade, state: AppState, request: ConnectRequest) -> Response {
    ws.on_upgrade(move |socket| run_connection(socket, state, request))
}

/// Drives one socket: writes the outbox and feeds text frames to the session.
///
/// Ends when the match closes the connection, the client goes away, or a
/// write fails. The session is always closed on the way out.
#[instrument(skip(socket, state))]
async fn run_connection(socket: WebSocket, state: AppState, request: ConnectRequest) {
    let (handle, mut outbox) = ConnectionHandle::channel(state.outbound_buffer);
    let (mut sink, mut stream) = socket.split();
    // A refused connection still has its result and close queued.
    let session = Session::open(&state.registry, request, handle).ok();

    loop {
        tokio::select! {
            outgoing = outbox.next() => {
                if !write_outgoing(&mut sink, outgoing).await {
                    break;
                }
            }
            frame = stream.next(), if session.is_some() => {
                let Some(session) = session.as_ref() else { break };
                match frame {
                    Some(Ok(Message::Text(text))) => session.handle_text(text.as_str()),
                    Some(Ok(Message::Binary(_))) => session.reply(ServerMessage::Error {
                        message: "Binary frames are not supported".to_string(),
                    }),
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client closed the connection");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "Socket read failed");
                        break;
                    }
                }
            }
        }
    }

    if let Some(session) = session {
        session.close();
    }
    drain_after_close(&mut outbox);
}

/// Writes one outbox item. Returns false when the worker should stop.
async fn write_outgoing(
    sink: &mut SplitSink<WebSocket, Message>,
    outgoing: Option<Outgoing>,
) -> bool {
    match outgoing {
        Some(Outgoing::Message(message)) => match serde_json::to_string(&message) {
            Ok(json) => match sink.send(Message::Text(json.into())).await {
                Ok(()) => true,
                Err(e) => {
                    debug!(error = %e, "Socket write failed");
                    false
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to encode server message");
                true
            }
        },
        Some(Outgoing::Close(tag)) => {
            send_close(sink, tag).await;
            false
        }
        None => false,
    }
}

async fn send_close(sink: &mut SplitSink<WebSocket, Message>, tag: ResultTag) {
    let frame = CloseFrame {
        code: close_code::NORMAL,
        reason: tag.as_str().into(),
    };
    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
        debug!(error = %e, %tag, "Close frame not delivered");
    }
}

fn drain_after_close(outbox: &mut Outbox) {
    let dropped = outbox.drain().len();
    if dropped > 0 {
        debug!(dropped, "Discarded messages queued after disconnect");
    }
}
