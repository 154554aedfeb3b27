use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use serde_json::{json, Value};

use crate::database::PoolStatus;
use crate::middleware::ApiResponse;
use crate::AppState;

/// GET / - service identification
pub async fn root() -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "auth": ["/api/login", "/api/refresh", "/api/logout", "/api/me", "/api/register"],
            "queries": crate::query::catalog().iter().map(|d| d.path).collect::<Vec<_>>()
        }
    }))
}

/// GET /health - process status and pool state.
///
/// Reads the pool state only; never connects or probes.
pub async fn health(State(state): State<AppState>) -> ApiResponse<Value> {
    let pool = state.db.status().await;
    let (status, code) = match pool {
        PoolStatus::Live => ("ok", StatusCode::OK),
        _ => ("degraded", StatusCode::SERVICE_UNAVAILABLE),
    };

    ApiResponse::with_status(
        json!({
            "status": status,
            "timestamp": Utc::now().to_rfc3339(),
            "database": pool.as_str(),
        }),
        code,
    )
}
