use crate::application_port::AuthError;
use crate::domain_model::{User, UserId};

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, uid: UserId) -> Result<User, AuthError>;
    async fn find_by_email(&self, email: &str) -> Result<User, AuthError>;
    /// Insert a new account row. Fails with `EmailTaken` when the email is
    /// already registered.
    async fn create(&self, user: &User) -> Result<(), AuthError>;
}
