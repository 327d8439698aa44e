use super::AuthError;
use crate::domain_model::{User, UserId};

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SigninInput {
    pub email: String,
    pub password: String,
}

#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    async fn get(&self, uid: UserId) -> Result<User, AuthError>;
    async fn signup(&self, input: SignupInput) -> Result<User, AuthError>;
    async fn signin(&self, input: SigninInput) -> Result<User, AuthError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}
