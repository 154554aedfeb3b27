use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Who a token speaks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub role: String,
    pub kind: TokenKind,
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            subject: self.sub.clone(),
            name: self.name.clone(),
            role: self.role.clone(),
        }
    }
}

/// Verification failures. Callers report all of them to clients as the same
/// "invalid token" response; the variants exist for server-side logs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("expected {expected:?} token")]
    WrongKind { expected: TokenKind },

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token generation error: {0}")]
    Generation(String),
}

/// Issues and verifies HS256 tokens signed with one shared secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_access(&self, identity: &Identity, ttl: Duration) -> Result<String, TokenError> {
        self.issue_at(identity, TokenKind::Access, ttl, Utc::now().timestamp())
    }

    pub fn issue_refresh(&self, identity: &Identity, ttl: Duration) -> Result<String, TokenError> {
        self.issue_at(identity, TokenKind::Refresh, ttl, Utc::now().timestamp())
    }

    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        self.verify_at(token, kind, Utc::now().timestamp())
    }

    /// Issue a token as of `now` (unix seconds).
    pub fn issue_at(
        &self,
        identity: &Identity,
        kind: TokenKind,
        ttl: Duration,
        now: i64,
    ) -> Result<String, TokenError> {
        let ttl_secs = i64::try_from(ttl.as_secs())
            .map_err(|_| TokenError::Generation("ttl out of range".to_string()))?;

        let claims = Claims {
            sub: identity.subject.clone(),
            name: identity.name.clone(),
            role: identity.role.clone(),
            kind,
            jti: Uuid::new_v4(),
            iat: now,
            exp: now.saturating_add(ttl_secs),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Generation(e.to_string()))
    }

    /// Verify signature, kind and expiry as of `now` (unix seconds). A token
    /// is expired once `now >= exp`, with no leeway.
    pub fn verify_at(&self, token: &str, kind: TokenKind, now: i64) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the supplied clock.
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?
            .claims;

        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.kind != kind {
            return Err(TokenError::WrongKind { expected: kind });
        }
        Ok(claims)
    }
}
