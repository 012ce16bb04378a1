// Module: http
// WebSocket messaging channel plus the health probe surface

pub mod error;
pub mod health;
pub mod websocket;

use axum::{routing::get, Router};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use clipstream_core::messaging::{ConnectionRegistry, MessageRouter};
use clipstream_core::Config;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: ConnectionRegistry,
    pub router: MessageRouter,
    /// Per-connection outbound channel capacity
    pub outbound_buffer: usize,
    /// Maximum accepted WebSocket frame size
    pub max_frame_bytes: usize,
}

/// Create the HTTP router with all routes
pub fn create_router(config: &Config, registry: ConnectionRegistry) -> Router {
    let message_router = MessageRouter::new(
        registry.clone(),
        Duration::from_secs(config.messaging.send_timeout_seconds),
    );

    let state = AppState {
        registry,
        router: message_router,
        outbound_buffer: config.messaging.outbound_buffer,
        max_frame_bytes: config.messaging.max_frame_bytes,
    };

    let router = Router::new()
        // Health check endpoints (for monitoring probes)
        .merge(health::create_health_router())
        // Real-time messaging channel, identity carried in the path
        .route("/ws/{user_id}", get(websocket::websocket_handler));

    // Apply layers before state
    let router = router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Apply state to all routes (must be last)
    router.with_state(state)
}
