use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod host;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod model;

use host::HostHandle;
use mcp::dispatch::Dispatcher;

/// Caller settings applied to every request the API token makes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerDefaults {
    pub assistant: String,
    pub language: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub api_token: Arc<str>,
    pub host: HostHandle,
    pub dispatcher: Arc<Dispatcher>,
    pub defaults: Arc<CallerDefaults>,
}

impl AppState {
    pub fn new(api_token: String, host: HostHandle, defaults: CallerDefaults) -> Self {
        Self {
            api_token: Arc::<str>::from(api_token),
            host,
            dispatcher: Arc::new(Dispatcher::with_protocol_commands()),
            defaults: Arc::new(defaults),
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/mcp", post(http::handlers::mcp_endpoint))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_token,
        ));

    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .merge(protected)
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}
