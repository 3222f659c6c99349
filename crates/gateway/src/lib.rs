//! # Roomsync Gateway Crate
//!
//! HTTP and WebSocket surface of the collaboration server. Routes WebSocket
//! connections into the synchronization engine and exposes a health probe.
//!
//! ## Architecture
//!
//! - **REST**: health probe and the JSON fallback for unknown routes
//! - **WebSocket**: `/ws`, one engine connection per socket
//! - **State**: shared engine handle
//! - **Middleware**: request logging
//!
//! ## Usage
//!
//! ```rust,ignore
//! use roomsync_gateway::{create_router, GatewayState};
//!
//! let app = create_router(GatewayState::new(engine));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:7070").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod websocket;

pub use error::{GatewayError, GatewayResult};
pub use state::GatewayState;

use axum::{http::Method, middleware as axum_middleware, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let state = Arc::new(state);
    Router::new()
        .merge(rest::create_rest_routes())
        .merge(websocket::create_websocket_routes())
        .fallback(rest::not_found)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers(Any),
        )
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
}
