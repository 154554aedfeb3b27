pub mod auth;
pub mod response;

pub use auth::{bypass_auth, optional_auth, require_auth, AuthPolicy, AuthUser};
pub use response::{ApiResponse, ApiResult};
