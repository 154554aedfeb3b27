use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{blocking, refresh_cookie, REFRESH_COOKIE};
use crate::auth::{verify_password, Identity, PLACEHOLDER_HASH};
use crate::database::users::{find_user_by_username, UserProfile};
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::AppState;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: u64,
    pub user: UserProfile,
}

/// POST /api/login - exchange credentials for an access token and a refresh cookie
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, ApiResponse<LoginResponse>), ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::invalid_json(e.body_text()))?;
    let username = request.username.trim().to_string();
    if username.is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("Username and password are required"));
    }

    let found = find_user_by_username(state.db.as_ref(), &username)
        .await
        .map_err(|e| ApiError::from_database(e, state.expose_error_details))?;
    let password = request.password;
    let Some(user) = found else {
        let _ = blocking(move || verify_password(&password, PLACEHOLDER_HASH)).await?;
        info!(%username, "Login failed: unknown user");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    let stored = user.password_hash.clone();
    let matches = match blocking(move || verify_password(&password, &stored)).await? {
        Ok(matches) => matches,
        Err(e) => {
            warn!(%username, error = %e, "Stored password is not a valid hash");
            false
        }
    };
    if !matches {
        info!(%username, "Login failed: wrong password");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    if !user.active {
        info!(%username, "Login refused: account disabled");
        return Err(ApiError::forbidden("Account is disabled"));
    }

    let identity = Identity {
        subject: user.id.to_string(),
        name: user.display_name.clone(),
        role: user.role.clone(),
    };
    let tokens = &state.tokens;
    let access = tokens
        .issue_access(&identity, tokens.access_ttl())
        .map_err(|e| ApiError::internal_server_error(e.to_string()))?;
    let refresh = tokens
        .issue_refresh(&identity, tokens.refresh_ttl())
        .map_err(|e| ApiError::internal_server_error(e.to_string()))?;

    info!(%username, user_id = user.id, "Login succeeded");
    let jar = jar.add(refresh_cookie(refresh, state.secure_cookies, tokens.refresh_ttl()));
    Ok((
        jar,
        ApiResponse::success(LoginResponse {
            token: access,
            expires_in: tokens.access_ttl().as_secs(),
            user: UserProfile::from(&user),
        }),
    ))
}

/// POST /api/logout - clear the refresh cookie.
///
/// Access tokens already issued stay valid until they expire.
pub async fn logout(jar: CookieJar) -> (CookieJar, ApiResponse<Value>) {
    let jar = jar.remove(Cookie::build(REFRESH_COOKIE).path("/api"));
    (jar, ApiResponse::success(json!({ "message": "Logged out" })))
}
