use super::token_codec;
use crate::application_port::{
    AuthError, IdentityToken, RefreshToken, TokenPair, TokenService, TokenVerifyResult,
};
use crate::domain_model::{User, UserId};
use crate::domain_port::TokenStore;
use crate::logger::*;
use jsonwebtoken::{DecodingKey, EncodingKey};
use std::sync::Arc;
use std::time::Duration;

/// Signing/verification keys, loaded once at startup and immutable after.
///
/// Identity tokens are RS256-signed so other services holding only the public
/// key can verify them without being able to mint. Refresh tokens are
/// HS256-signed: only this service ever verifies them.
pub struct KeyMaterial {
    id_signing: EncodingKey,
    id_verifying: DecodingKey,
    refresh_signing: EncodingKey,
    refresh_verifying: DecodingKey,
}

impl KeyMaterial {
    pub fn new(
        rsa_private_pem: &[u8],
        rsa_public_pem: &[u8],
        refresh_secret: &[u8],
    ) -> anyhow::Result<Self> {
        Ok(KeyMaterial {
            id_signing: EncodingKey::from_rsa_pem(rsa_private_pem)?,
            id_verifying: DecodingKey::from_rsa_pem(rsa_public_pem)?,
            refresh_signing: EncodingKey::from_secret(refresh_secret),
            refresh_verifying: DecodingKey::from_secret(refresh_secret),
        })
    }
}

pub struct TokenConfig {
    pub keys: KeyMaterial,
    pub id_ttl: Duration,
    pub refresh_ttl: Duration,
}

pub struct RealTokenService {
    store: Arc<dyn TokenStore>,
    cfg: TokenConfig,
}

impl RealTokenService {
    pub fn new(store: Arc<dyn TokenStore>, cfg: TokenConfig) -> Self {
        RealTokenService { store, cfg }
    }
}

#[async_trait::async_trait]
impl TokenService for RealTokenService {
    async fn issue_pair(&self, user: &User, prev_token_id: &str) -> Result<TokenPair, AuthError> {
        let id_token =
            token_codec::mint_identity_token(user, &self.cfg.keys.id_signing, self.cfg.id_ttl)
                .map_err(|e| {
                    error!(uid = %user.uid, "minting identity token: {e}");
                    AuthError::Internal("could not mint identity token".to_string())
                })?;

        let refresh = token_codec::mint_refresh_token(
            user.uid,
            &self.cfg.keys.refresh_signing,
            self.cfg.refresh_ttl,
        )
        .map_err(|e| {
            error!(uid = %user.uid, "minting refresh token: {e}");
            AuthError::Internal("could not mint refresh token".to_string())
        })?;

        // A refresh token is only handed out once its id is durably recorded,
        // otherwise a stolen token could outlive our ability to revoke it.
        self.store
            .set_refresh_token(user.uid, &refresh.token_id, refresh.expires_in.as_secs())
            .await
            .map_err(|e| {
                error!(uid = %user.uid, token_id = %refresh.token_id, "storing refresh token id: {e}");
                AuthError::Internal("could not record refresh token".to_string())
            })?;

        // Rotation: the abandoned entry self-expires if this fails, so the
        // new credential is returned regardless.
        if !prev_token_id.is_empty() {
            if let Err(e) = self
                .store
                .delete_refresh_token(user.uid, prev_token_id)
                .await
            {
                warn!(uid = %user.uid, token_id = prev_token_id, "could not revoke previous refresh token: {e}");
            }
        }

        Ok(TokenPair {
            id_token: IdentityToken(id_token),
            refresh_token: RefreshToken(refresh.token),
        })
    }

    async fn verify_identity_token(&self, token: &str) -> Result<User, AuthError> {
        let claims = token_codec::validate_identity_token(token, &self.cfg.keys.id_verifying)?;
        Ok(claims.user)
    }

    async fn verify_refresh_token(&self, token: &str) -> Result<TokenVerifyResult, AuthError> {
        let claims = token_codec::decode_refresh_claims(token, &self.cfg.keys.refresh_verifying)?;

        // The signed token alone is not enough; a rotated-away or signed-out
        // id is gone from the store even before the token itself expires.
        let live = self
            .store
            .refresh_token_exists(claims.uid, &claims.jti)
            .await?;
        if !live {
            return Err(AuthError::InvalidToken(
                crate::application_port::InvalidTokenReason::Expired,
            ));
        }

        Ok(TokenVerifyResult {
            user_id: claims.uid,
            token_id: claims.jti,
        })
    }

    async fn sign_out(&self, user_id: UserId, token_id: &str) -> Result<(), AuthError> {
        self.store.delete_refresh_token(user_id, token_id).await
    }
}
