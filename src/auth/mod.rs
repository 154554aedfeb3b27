pub mod password;
pub mod token;

pub use password::{
    hash_password, verify_password, PasswordError, MIN_PASSWORD_LENGTH, PLACEHOLDER_HASH,
};
pub use token::{Claims, Identity, TokenError, TokenKind, TokenService};
