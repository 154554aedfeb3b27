// Route handlers. `build_app` decides which auth layer wraps each one.
pub mod auth;
pub mod health;
pub mod query;

pub use health::{health, root};
