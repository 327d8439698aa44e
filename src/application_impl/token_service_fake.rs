use crate::application_port::{
    AuthError, IdentityToken, InvalidTokenReason, RefreshToken, TokenPair, TokenService,
    TokenVerifyResult,
};
use crate::domain_model::{User, UserId};
use std::collections::HashSet;
use std::sync::Mutex;
use uuid::Uuid;

/// String-prefix tokens plus an in-memory live-id set. No crypto, but the
/// rotation semantics match the real service.
#[derive(Default)]
pub struct FakeTokenService {
    live: Mutex<HashSet<String>>,
}

impl FakeTokenService {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(user_id: UserId, token_id: &str) -> String {
        format!("{}:{}", user_id, token_id)
    }
}

#[async_trait::async_trait]
impl TokenService for FakeTokenService {
    async fn issue_pair(&self, user: &User, prev_token_id: &str) -> Result<TokenPair, AuthError> {
        let token_id = Uuid::new_v4().to_string();
        let mut live = self
            .live
            .lock()
            .map_err(|_| AuthError::Internal("poisoned".to_string()))?;
        live.insert(Self::key(user.uid, &token_id));
        if !prev_token_id.is_empty() {
            live.remove(&Self::key(user.uid, prev_token_id));
        }

        Ok(TokenPair {
            id_token: IdentityToken(format!("fake-id-token:{}:{}", user.uid, user.email)),
            refresh_token: RefreshToken(format!("fake-refresh-token:{}:{}", user.uid, token_id)),
        })
    }

    async fn verify_identity_token(&self, token: &str) -> Result<User, AuthError> {
        let rest = token
            .strip_prefix("fake-id-token:")
            .ok_or(AuthError::InvalidToken(InvalidTokenReason::Malformed))?;
        let (uid, email) = rest
            .split_once(':')
            .ok_or(AuthError::InvalidToken(InvalidTokenReason::Malformed))?;
        let uid = uid
            .parse::<UserId>()
            .map_err(|_| AuthError::InvalidToken(InvalidTokenReason::Malformed))?;
        Ok(User {
            uid,
            email: email.to_string(),
            name: String::new(),
            image_url: String::new(),
            website: String::new(),
            password_hash: String::new(),
        })
    }

    async fn verify_refresh_token(&self, token: &str) -> Result<TokenVerifyResult, AuthError> {
        let rest = token
            .strip_prefix("fake-refresh-token:")
            .ok_or(AuthError::InvalidToken(InvalidTokenReason::Malformed))?;
        let (uid, token_id) = rest
            .split_once(':')
            .ok_or(AuthError::InvalidToken(InvalidTokenReason::Malformed))?;
        let user_id = uid
            .parse::<UserId>()
            .map_err(|_| AuthError::InvalidToken(InvalidTokenReason::Malformed))?;

        let live = self
            .live
            .lock()
            .map_err(|_| AuthError::Internal("poisoned".to_string()))?;
        if !live.contains(&Self::key(user_id, token_id)) {
            return Err(AuthError::InvalidToken(InvalidTokenReason::Expired));
        }

        Ok(TokenVerifyResult {
            user_id,
            token_id: token_id.to_string(),
        })
    }

    async fn sign_out(&self, user_id: UserId, token_id: &str) -> Result<(), AuthError> {
        let mut live = self
            .live
            .lock()
            .map_err(|_| AuthError::Internal("poisoned".to_string()))?;
        live.remove(&Self::key(user_id, token_id));
        Ok(())
    }
}
