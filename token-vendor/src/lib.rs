pub mod config;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod startup;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::services::{ActionTable, CredentialBroker, DecisionClient, TokenVerifier};
use gateway_core::middleware::tracing::{request_id_middleware, REQUEST_ID_HEADER};

/// Shared, read-only per-process state. The action table and config are
/// built once before the listener starts and never mutated afterwards, so
/// handlers read them without locking.
#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub verifier: TokenVerifier,
    pub actions: Arc<ActionTable>,
    pub authz: Arc<dyn DecisionClient>,
    pub broker: Arc<dyn CredentialBroker>,
}

pub fn build_router(state: AppState) -> Router {
    // Credential and authorization routes sit behind the token middleware;
    // the health probe stays outside it.
    let protected = Router::new()
        .route(
            "/",
            get(handlers::vend_credentials).post(handlers::vend_credentials),
        )
        .route("/authorize", any(handlers::authorize))
        .route("/authorize/*original_path", any(handlers::authorize))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(protected)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
}
