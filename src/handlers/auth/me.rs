use axum::Extension;

use crate::middleware::{ApiResponse, AuthUser};

/// GET /api/me - identity attached by the auth middleware
pub async fn me(Extension(user): Extension<AuthUser>) -> ApiResponse<AuthUser> {
    ApiResponse::success(user)
}
