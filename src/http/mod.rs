//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! HttpServer::new(routes)
//!     → attach_socket() (websocket.rs mounts the upgrade route)
//!     → listen(port)
//!         → server.rs (accept loop, graceful connection shutdown)
//!         → request.rs (request id in, request id out)
//!         → timeout / body limit / trace layers
//!         → host routes or socket upgrade
//!     → ServerHandle::close(grace)
//! ```

pub mod request;
pub mod server;
pub mod websocket;

pub use request::{RequestId, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use server::{CloseOutcome, HttpServer, ServerHandle};
pub use websocket::{SocketServer, WebSocketHub};
