//! REST endpoints for the gateway

pub mod health;

use axum::{http::Uri, routing::get, Router};
use std::sync::Arc;

use crate::error::GatewayError;
use crate::state::GatewayState;

pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/health", get(health::health_check))
}

/// JSON 404 for unmatched routes
pub async fn not_found(uri: Uri) -> GatewayError {
    GatewayError::NotFound(format!("no route for {}", uri.path()))
}

pub use health::*;
