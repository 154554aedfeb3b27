use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;
use tracing::info;

use super::blocking;
use crate::auth::{hash_password, MIN_PASSWORD_LENGTH};
use crate::database::users::{insert_user, NewUser, UserProfile};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::AppState;

const ROLES: &[&str] = &["admin", "user"];

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub name: Option<String>,
    pub role: Option<String>,
}

/// POST /api/register - admin-only account creation
pub async fn register(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<UserProfile> {
    if !caller.is_admin() {
        return Err(ApiError::forbidden("Admin role required"));
    }
    let Json(request) = payload.map_err(|e| ApiError::invalid_json(e.body_text()))?;

    let username = request.username.trim().to_string();
    validate_username(&username)?;
    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::validation_error(
            format!("password must be at least {} characters", MIN_PASSWORD_LENGTH),
            Some("password".to_string()),
        ));
    }
    let role = request.role.as_deref().unwrap_or("user").trim().to_lowercase();
    if !ROLES.contains(&role.as_str()) {
        return Err(ApiError::validation_error(
            format!("role must be one of: {}", ROLES.join(", ")),
            Some("role".to_string()),
        ));
    }
    let name = request
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| username.clone());

    let password = request.password;
    let hash = blocking(move || hash_password(&password))
        .await?
        .map_err(|e| ApiError::internal_server_error(e.to_string()))?;

    let id = insert_user(
        state.db.as_ref(),
        NewUser {
            username: &username,
            display_name: &name,
            password_hash: &hash,
            role: &role,
        },
    )
    .await
    .map_err(|e| ApiError::from_database(e, state.expose_error_details))?;

    info!(%username, user_id = id, created_by = %caller.id, "User created");
    Ok(ApiResponse::created(UserProfile {
        id,
        username,
        name,
        role,
    }))
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    let field = Some("username".to_string());
    if username.chars().count() < 3 || username.chars().count() > 50 {
        return Err(ApiError::validation_error(
            "username must be between 3 and 50 characters",
            field,
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(ApiError::validation_error(
            "username may only contain letters, digits, '_', '-' and '.'",
            field,
        ));
    }
    Ok(())
}
