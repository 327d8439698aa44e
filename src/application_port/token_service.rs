use crate::domain_model::{User, UserId};
use serde::Serialize;
use std::fmt;

/// Why an identity or refresh token failed validation. The three reasons share
/// one error kind but callers may want to log them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidTokenReason {
    Malformed,
    BadSignature,
    Expired,
}

impl fmt::Display for InvalidTokenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidTokenReason::Malformed => write!(f, "malformed"),
            InvalidTokenReason::BadSignature => write!(f, "bad signature"),
            InvalidTokenReason::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("token id generation failed: {0}")]
    IdGeneration(String),
    #[error("invalid token: {0}")]
    InvalidToken(InvalidTokenReason),
    #[error("revocation store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("invalid email or password")]
    Unauthorized,
    #[error("user not found")]
    UserNotFound,
    #[error("email already in use")]
    EmailTaken,
    #[error("internal error: {0}")]
    Internal(String),
}

/// Short-lived RS256-signed assertion of identity. Stateless: the server
/// keeps no record of it.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityToken(pub String);

/// Longer-lived HS256-signed credential. Its token id must also be present in
/// the revocation store for the token to count as valid.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub id_token: IdentityToken,
    pub refresh_token: RefreshToken,
}

#[derive(Debug, Clone)]
pub struct TokenVerifyResult {
    pub user_id: UserId,
    pub token_id: String,
}

#[async_trait::async_trait]
pub trait TokenService: Send + Sync {
    /// Mint a fresh pair for `user` and record the new refresh token id in the
    /// revocation store. A non-empty `prev_token_id` is best-effort revoked
    /// after the new pair is durably recorded.
    async fn issue_pair(&self, user: &User, prev_token_id: &str) -> Result<TokenPair, AuthError>;

    /// Verify signature and expiry, returning the embedded user snapshot.
    async fn verify_identity_token(&self, token: &str) -> Result<User, AuthError>;

    /// Verify signature and expiry, then require the token id to still be
    /// present in the revocation store.
    async fn verify_refresh_token(&self, token: &str) -> Result<TokenVerifyResult, AuthError>;

    /// Drop the revocation-store record for one refresh token.
    async fn sign_out(&self, user_id: UserId, token_id: &str) -> Result<(), AuthError>;
}
