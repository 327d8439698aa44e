use crate::application_port::AuthError;
use crate::domain_model::UserId;
use crate::domain_port::TokenStore;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

pub struct RedisTokenStore {
    conn: ConnectionManager,
}

impl RedisTokenStore {
    pub fn new(conn: ConnectionManager) -> Self {
        RedisTokenStore { conn }
    }

    fn key(user_id: UserId, token_id: &str) -> String {
        format!("{}:{}", user_id, token_id)
    }
}

#[async_trait::async_trait]
impl TokenStore for RedisTokenStore {
    async fn set_refresh_token(
        &self,
        user_id: UserId,
        token_id: &str,
        ttl_secs: u64,
    ) -> Result<(), AuthError> {
        let key = Self::key(user_id, token_id);
        let mut conn = self.conn.clone();
        // the value is a placeholder, key presence is what matters
        let _: () = conn
            .set_ex(&key, 0i64, ttl_secs)
            .await
            .map_err(|e| AuthError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn refresh_token_exists(
        &self,
        user_id: UserId,
        token_id: &str,
    ) -> Result<bool, AuthError> {
        let key = Self::key(user_id, token_id);
        let mut conn = self.conn.clone();
        let present: bool = conn
            .exists(&key)
            .await
            .map_err(|e| AuthError::StoreUnavailable(e.to_string()))?;
        Ok(present)
    }

    async fn delete_refresh_token(&self, user_id: UserId, token_id: &str) -> Result<(), AuthError> {
        let key = Self::key(user_id, token_id);
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(&key)
            .await
            .map_err(|e| AuthError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }
}
