//! WebSocket surface of the gateway

pub mod room;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::state::GatewayState;

pub fn create_websocket_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/ws", get(room::websocket_handler))
}
