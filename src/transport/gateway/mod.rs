//! Axum gateway: control WebSocket, frame stream, media signaling and health.
//!
//! - Request body size limit (64KB)
//! - Request timeout (30s)
//! - Optional CORS for browser front ends

mod control;
pub mod events;
mod handlers;
mod server;
mod websocket;

pub use control::handle_client_message;
pub use events::{ClientMessage, ServerMessage};
pub use server::{run_gateway, run_gateway_with_listener};

use crate::app::AppContext;
use std::sync::Arc;

/// Maximum request body size (64KB). SDP offers fit comfortably.
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<AppContext>,
}
