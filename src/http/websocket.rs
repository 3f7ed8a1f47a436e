//! Socket transport.
//!
//! # Responsibilities
//! - Mount the WebSocket upgrade route on the HTTP router before it listens
//! - Fan broadcast messages out to every connected client
//! - On shutdown, refuse new upgrades and close live connections
//!
//! # Data Flow
//! ```text
//! publish(message)
//!     → broadcast channel
//!     → one task per connection → client
//!
//! shutdown()
//!     → signal every connection task → close frame (1001)
//!     → wait for connection count to reach zero (bounded)
//! ```
//!
//! # Design Decisions
//! - Attached before listen, so no connection races an unconfigured socket layer
//! - A lagging client skips missed messages instead of stalling the others
//! - Each attach starts a fresh shutdown signal, so a hub survives stop/start

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::config::SocketSettings;
use crate::error::BoxError;
use crate::lifecycle::Shutdown;
use crate::net::connection::{ConnectionGuard, ConnectionTracker};

/// The duplex transport attached to the HTTP server.
#[async_trait]
pub trait SocketServer: Send + Sync {
    /// Mount the transport's routes. Called once per server, before listen.
    fn attach(&self, router: Router) -> Router;

    /// Stop accepting connections and close the live ones.
    async fn shutdown(&self) -> Result<(), BoxError>;
}

struct HubInner {
    settings: SocketSettings,
    events: broadcast::Sender<String>,
    tracker: ConnectionTracker,
    shutdown: ArcSwap<Shutdown>,
}

/// Broadcast WebSocket hub.
#[derive(Clone)]
pub struct WebSocketHub {
    inner: Arc<HubInner>,
}

impl WebSocketHub {
    pub fn new(settings: SocketSettings) -> Self {
        let (events, _) = broadcast::channel(settings.broadcast_capacity.max(1));
        let shutdown = Shutdown::new();
        // A hub that was never attached refuses upgrades.
        shutdown.trigger();

        Self {
            inner: Arc::new(HubInner {
                settings,
                events,
                tracker: ConnectionTracker::new(),
                shutdown: ArcSwap::from_pointee(shutdown),
            }),
        }
    }

    /// Send a text message to every connected client. Returns how many received it.
    pub fn publish(&self, message: impl Into<String>) -> usize {
        self.inner.events.send(message.into()).unwrap_or(0)
    }

    pub fn active_connections(&self) -> u64 {
        self.inner.tracker.active_count()
    }

    pub fn path(&self) -> &str {
        &self.inner.settings.path
    }
}

#[async_trait]
impl SocketServer for WebSocketHub {
    fn attach(&self, router: Router) -> Router {
        self.inner.shutdown.store(Arc::new(Shutdown::new()));
        tracing::info!(path = %self.inner.settings.path, "Socket transport attached");

        router.merge(
            Router::new()
                .route(&self.inner.settings.path, get(upgrade))
                .with_state(Arc::clone(&self.inner)),
        )
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        self.inner.shutdown.load().trigger();

        let timeout = Duration::from_millis(self.inner.settings.close_timeout_ms);
        if !self.inner.tracker.wait_for_idle(timeout).await {
            return Err(format!(
                "{} socket connections still open after {}ms",
                self.inner.tracker.active_count(),
                self.inner.settings.close_timeout_ms
            )
            .into());
        }

        tracing::info!("Socket transport closed");
        Ok(())
    }
}

async fn upgrade(State(hub): State<Arc<HubInner>>, ws: WebSocketUpgrade) -> Response {
    if hub.shutdown.load().is_triggered() {
        return (StatusCode::SERVICE_UNAVAILABLE, "socket transport is shutting down").into_response();
    }

    let guard = hub.tracker.track();
    ws.on_upgrade(move |socket| serve_connection(hub, socket, guard))
}

async fn serve_connection(hub: Arc<HubInner>, mut socket: WebSocket, guard: ConnectionGuard) {
    let mut events = hub.events.subscribe();
    let stopped = hub.shutdown.load().subscribe().wait();
    tokio::pin!(stopped);

    tracing::debug!(connection_id = %guard.id(), "Socket connected");

    loop {
        tokio::select! {
            _ = &mut stopped => {
                let frame = CloseFrame {
                    code: close_code::AWAY,
                    reason: "server shutting down".into(),
                };
                let _ = socket.send(Message::Close(Some(frame))).await;
                break;
            }
            event = events.recv() => match event {
                Ok(text) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(connection_id = %guard.id(), skipped, "Socket client lagging, messages dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!(connection_id = %guard.id(), "Socket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SocketSettings {
        SocketSettings {
            close_timeout_ms: 50,
            ..SocketSettings::default()
        }
    }

    #[test]
    fn publish_without_clients_reaches_nobody() {
        let hub = WebSocketHub::new(settings());
        assert_eq!(hub.publish("hello"), 0);
    }

    #[tokio::test]
    async fn shutdown_with_no_connections_is_clean() {
        let hub = WebSocketHub::new(settings());
        let _router = hub.attach(Router::new());
        hub.shutdown().await.unwrap();
        assert!(hub.inner.shutdown.load().is_triggered());
    }

    #[tokio::test]
    async fn attach_rearms_after_shutdown() {
        let hub = WebSocketHub::new(settings());
        assert!(hub.inner.shutdown.load().is_triggered());

        let _router = hub.attach(Router::new());
        assert!(!hub.inner.shutdown.load().is_triggered());
    }

    #[tokio::test]
    async fn shutdown_reports_stuck_connections() {
        let hub = WebSocketHub::new(settings());
        let _router = hub.attach(Router::new());
        let _guard = hub.inner.tracker.track();

        assert!(hub.shutdown().await.is_err());
    }
}
