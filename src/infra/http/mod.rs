//! HTTP surface of the proxy.

mod error;
mod handlers;
mod middleware;
mod state;

pub use error::{analysis_error_response, query_error_response};
pub use middleware::RequestContext;
pub use state::HttpState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;

use middleware::{log_responses, set_request_context};

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/query", post(handlers::query))
        .route("/analyze", post(handlers::analyze))
        .route("/analyze/{session_id}", delete(handlers::delete_analysis))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
        .layer(CorsLayer::permissive())
}
