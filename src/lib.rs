pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod query;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::auth::TokenService;
use crate::database::Database;
use crate::middleware::require_auth;

/// Shared request state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub tokens: Arc<TokenService>,
    /// Surface raw database messages for uncategorized failures.
    pub expose_error_details: bool,
    pub secure_cookies: bool,
}

/// Assemble every route. The binary adds CORS and tracing on top.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        // Session
        .merge(auth_public_routes())
        // Bearer token required
        .merge(auth_routes(&state))
        // Descriptor-driven queries, each with its own auth policy
        .merge(query_routes(&state))
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use handlers::auth;

    Router::new()
        .route("/api/login", post(auth::login))
        .route("/api/refresh", post(auth::refresh))
        .route("/api/logout", post(auth::logout))
}

fn auth_routes(state: &AppState) -> Router<AppState> {
    use handlers::auth;

    Router::new()
        .route("/api/me", get(auth::me))
        .route("/api/register", post(auth::register))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}

fn query_routes(state: &AppState) -> Router<AppState> {
    query::catalog()
        .iter()
        .fold(Router::new(), |router, descriptor| {
            router.merge(handlers::query::endpoint_routes(descriptor, state))
        })
}

/// CORS from the configured origin list. Empty allows no cross-origin
/// callers; `*` allows any.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring malformed CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
