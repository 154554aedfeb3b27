pub mod login;
pub mod me;
pub mod refresh;
pub mod register;

pub use login::{login, logout};
pub use me::me;
pub use refresh::refresh;
pub use register::register;

use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, SameSite};

/// Name of the http-only cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Refresh cookie scoped to the API, unreadable from scripts. It expires
/// together with the token it carries.
pub(crate) fn refresh_cookie(token: String, secure: bool, lifetime: Duration) -> Cookie<'static> {
    let max_age = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/api")
        .secure(secure)
        .max_age(time::Duration::seconds(max_age))
        .build()
}

/// Run a blocking password hash operation off the async executor.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, crate::error::ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!(error = %e, "Password task failed");
        crate::error::ApiError::internal_server_error("Internal server error")
    })
}
