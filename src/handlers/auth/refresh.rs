use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use tracing::debug;

use super::REFRESH_COOKIE;
use crate::auth::TokenKind;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub token: String,
    pub expires_in: u64,
}

/// POST /api/refresh - new access token from the refresh cookie
pub async fn refresh(State(state): State<AppState>, jar: CookieJar) -> ApiResult<RefreshResponse> {
    let cookie = jar
        .get(REFRESH_COOKIE)
        .ok_or_else(|| ApiError::unauthorized("Refresh token required"))?;

    let claims = state
        .tokens
        .verify(cookie.value(), TokenKind::Refresh)
        .map_err(|e| {
            debug!(reason = %e, "Rejected refresh token");
            ApiError::forbidden("Invalid or expired refresh token")
        })?;

    let token = state
        .tokens
        .issue_access(&claims.identity(), state.tokens.access_ttl())
        .map_err(|e| ApiError::internal_server_error(e.to_string()))?;

    Ok(ApiResponse::success(RefreshResponse {
        token,
        expires_in: state.tokens.access_ttl().as_secs(),
    }))
}
