//! HTTP server object and its running handle.
//!
//! # Responsibilities
//! - Hold the router the host application mounts
//! - Let the socket transport attach before binding
//! - Wire up middleware (tracing, limits, request ID, timeout)
//! - Bind the listener and serve with graceful shutdown
//! - Close within a grace window, then force remaining connections
//!
//! # Design Decisions
//! - Creating the server never binds; `listen` does
//! - Middleware wraps every route, including the socket route
//! - A forced close aborts the serve task, dropping open connections
//! - Connections are served with upgrades enabled (socket transport)

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
    service::TowerToHyperService,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::HttpSettings;
use crate::error::SupervisorError;
use crate::http::request::RequestIdLayer;
use crate::http::websocket::SocketServer;
use crate::lifecycle::shutdown::{Shutdown, ShutdownListener};

/// An HTTP server that has not started listening.
pub struct HttpServer {
    router: Router,
    settings: HttpSettings,
}

impl HttpServer {
    pub fn new(routes: Router, settings: &HttpSettings) -> Self {
        Self {
            router: routes,
            settings: settings.clone(),
        }
    }

    /// Mount the socket transport on this server.
    pub fn attach_socket(&mut self, socket: &dyn SocketServer) {
        let router = std::mem::take(&mut self.router);
        self.router = socket.attach(router);
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn into_app(self) -> Router {
        self.router
            .layer(TimeoutLayer::new(Duration::from_secs(self.settings.request_timeout_secs)))
            .layer(RequestBodyLimitLayer::new(self.settings.max_body_bytes))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind `bind_host:port` and start serving in the background.
    ///
    /// Port 0 binds an ephemeral port; the handle reports the real one.
    pub async fn listen(self, port: u16) -> Result<ServerHandle, SupervisorError> {
        let addr = format!("{}:{}", self.settings.bind_host, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| SupervisorError::Listen {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| SupervisorError::Listen { addr, source })?;

        let shutdown = Shutdown::new();
        let task = tokio::spawn(serve(listener, self.into_app(), shutdown.subscribe()));

        tracing::info!(address = %local_addr, "HTTP server listening");
        Ok(ServerHandle {
            local_addr,
            shutdown,
            task: Mutex::new(Some(task)),
        })
    }
}

/// Accept loop. Connections live in a `JoinSet` owned by this task, so
/// aborting the task drops every open connection.
async fn serve(listener: TcpListener, app: Router, shutdown: ShutdownListener) {
    let mut connections = JoinSet::new();
    let stopped = shutdown.clone().wait();
    tokio::pin!(stopped);

    loop {
        tokio::select! {
            _ = &mut stopped => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        continue;
                    }
                };
                let service = TowerToHyperService::new(app.clone());
                connections.spawn(serve_connection(stream, peer, service, shutdown.clone()));
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    tracing::debug!(open = connections.len(), "Listener closed, draining connections");
    while connections.join_next().await.is_some() {}
    tracing::info!("HTTP server stopped");
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    service: TowerToHyperService<Router>,
    shutdown: ShutdownListener,
) {
    let builder = auto::Builder::new(TokioExecutor::new());
    let connection = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = shutdown.wait() => {
            connection.as_mut().graceful_shutdown();
            connection.await
        }
    };
    if let Err(e) = result {
        tracing::debug!(peer = %peer, error = %e, "Connection closed with error");
    }
}

/// How a [`ServerHandle::close`] finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Every connection finished inside the grace window.
    Graceful,
    /// The grace window elapsed and remaining connections were dropped.
    Forced,
    /// The server was already closed.
    AlreadyClosed,
}

/// A listening server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Stop accepting, let in-flight requests finish within `grace`, then force.
    pub async fn close(&self, grace: Duration) -> CloseOutcome {
        self.shutdown.trigger();

        let Some(mut task) = self.task.lock().await.take() else {
            return CloseOutcome::AlreadyClosed;
        };

        match tokio::time::timeout(grace, &mut task).await {
            Ok(_) => CloseOutcome::Graceful,
            Err(_) => {
                tracing::warn!(grace_ms = grace.as_millis() as u64, "Grace window elapsed, forcing connections closed");
                task.abort();
                let _ = task.await;
                CloseOutcome::Forced
            }
        }
    }
}
