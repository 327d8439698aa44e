use crate::application_port::{AuthError, CredentialHasher, SigninInput, SignupInput, UserService};
use crate::domain_model::{User, UserId};
use crate::domain_port::UserRepo;
use std::sync::Arc;
use uuid::Uuid;

pub struct RealUserService {
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
}

impl RealUserService {
    pub fn new(user_repo: Arc<dyn UserRepo>, credential_hasher: Arc<dyn CredentialHasher>) -> Self {
        RealUserService {
            user_repo,
            credential_hasher,
        }
    }
}

#[async_trait::async_trait]
impl UserService for RealUserService {
    async fn get(&self, uid: UserId) -> Result<User, AuthError> {
        self.user_repo.find_by_id(uid).await
    }

    async fn signup(&self, input: SignupInput) -> Result<User, AuthError> {
        let password_hash = self.credential_hasher.hash_password(&input.password).await?;

        let user = User {
            uid: UserId(Uuid::new_v4()),
            email: input.email,
            name: String::new(),
            image_url: String::new(),
            website: String::new(),
            password_hash,
        };
        self.user_repo.create(&user).await?;

        Ok(user)
    }

    async fn signin(&self, input: SigninInput) -> Result<User, AuthError> {
        let user = self
            .user_repo
            .find_by_email(&input.email)
            .await
            .map_err(|_| AuthError::Unauthorized)?;

        let ok = self
            .credential_hasher
            .verify_password(&input.password, &user.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::Unauthorized);
        }

        Ok(user)
    }
}
