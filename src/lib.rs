use axum::{Router, http::HeaderName};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod router;
pub mod service;
pub mod validation;

// Route tables, split by guard (public, authenticated, admin).
pub mod routes;

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use router::{ApiRequest, ApiResponse, Dispatcher, Guard};
pub use service::Services;

/// AppState
///
/// The single, thread-safe container handed to every guard and handler:
/// the entity services over the shared repository, and the loaded configuration.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            services: Services::new(repo, &config),
            config,
        }
    }
}

/// create_router
///
/// Builds the complete route table over `state` and wraps it in the HTTP stack.
pub fn create_router(state: AppState) -> Router {
    create_router_from(routes::dispatcher(state))
}

/// create_router_from
///
/// Mounts an already built dispatcher (possibly extended with `add_endpoint`)
/// as the single fallback of an axum router and applies the global layers.
pub fn create_router_from(dispatcher: Dispatcher) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Every (method, path) decision is made by the dispatcher.
    let base_router = Router::new()
        .fallback(router::serve)
        .with_state(Arc::new(dispatcher));

    // 3. Observability and Correlation Layers (Applied outermost/first)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: one span per request carrying the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the `x-request-id` header, so
/// every log line of one request is correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
