//! huddle-api - HTTP/WebSocket signaling surface
//!
//! Exposes the coordinator over a persistent per-participant WebSocket
//! (JSON request/response plus server-pushed room events) and a couple of
//! operational HTTP routes. See [`http::messages`] for the wire protocol.

pub mod http;

pub use http::{create_router, AppState};
