//! Pharmacy operations HTTP server
//!
//! Prescription intake and fulfillment, per-pharmacy inventory and pricing,
//! and the payments recorded when medication is dispensed.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;
pub mod validation;

pub use config::AppConfig;
pub use error::*;
pub use server::PharmacyServer;

use axum::{middleware::from_fn, Router};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Create the main application router with all routes and middleware
pub fn create_app(server: PharmacyServer) -> Router {
    let cors = middleware::create_cors_layer(&server.config.server.allowed_origins);
    let timeout = server.config.request_timeout();

    routes::create_routes()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(TimeoutLayer::new(timeout))
                .layer(from_fn(middleware::request_timing_middleware)),
        )
        .with_state(server)
}
