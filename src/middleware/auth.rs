use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use tracing::debug;

use crate::auth::{Claims, TokenKind};
use crate::error::ApiError;
use crate::AppState;

/// How a route treats the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    /// A valid access token is required.
    Required,
    /// Identity is attached when a valid token is present; otherwise the
    /// request proceeds anonymously.
    Optional,
    /// Credentials are ignored and the fixed system identity is attached.
    Bypass,
}

/// Identity attached to the request by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl AuthUser {
    /// Identity attached by [`AuthPolicy::Bypass`] routes.
    pub fn system() -> Self {
        Self {
            id: "system".to_string(),
            name: "System".to_string(),
            role: "system".to_string(),
            exp: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case("admin")
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name,
            role: claims.role,
            exp: Some(claims.exp),
        }
    }
}

/// Reject requests without a valid access token.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Access token required"))?;

    let claims = state.tokens.verify(token, TokenKind::Access).map_err(|e| {
        debug!(reason = %e, "Rejected access token");
        ApiError::forbidden("Invalid or expired token")
    })?;

    request.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(request).await)
}

/// Attach the caller's identity when a valid token is present.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_bearer(request.headers()) {
        match state.tokens.verify(token, TokenKind::Access) {
            Ok(claims) => {
                request.extensions_mut().insert(AuthUser::from(claims));
            }
            Err(e) => debug!(reason = %e, "Ignoring invalid token on optional route"),
        }
    }
    next.run(request).await
}

/// Attach the system identity regardless of any credentials.
pub async fn bypass_auth(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(AuthUser::system());
    next.run(request).await
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
