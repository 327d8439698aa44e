use crate::application_port::AuthError;
use crate::domain_model::UserId;

/// Server-side revocation state for refresh tokens, keyed by
/// `"{user_id}:{token_id}"`. Entries expire on their own when the token they
/// mirror would expire anyway.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Record a refresh token id with the given remaining lifetime.
    async fn set_refresh_token(
        &self,
        user_id: UserId,
        token_id: &str,
        ttl_secs: u64,
    ) -> Result<(), AuthError>;

    /// Check whether a refresh token id is still recorded.
    async fn refresh_token_exists(&self, user_id: UserId, token_id: &str)
    -> Result<bool, AuthError>;

    /// Drop a refresh token id, revoking it ahead of expiry.
    async fn delete_refresh_token(&self, user_id: UserId, token_id: &str)
    -> Result<(), AuthError>;
}
