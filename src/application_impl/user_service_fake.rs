use crate::application_port::{AuthError, SigninInput, SignupInput, UserService};
use crate::domain_model::{User, UserId};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

// Minimal in-memory backend for local runs and route tests. Passwords are
// compared in the clear; do not reach for this outside "fake" mode.
#[derive(Default)]
pub struct FakeUserService {
    users: Mutex<HashMap<UserId, User>>,
}

impl FakeUserService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UserService for FakeUserService {
    async fn get(&self, uid: UserId) -> Result<User, AuthError> {
        let users = self
            .users
            .lock()
            .map_err(|_| AuthError::Internal("poisoned".to_string()))?;
        users.get(&uid).cloned().ok_or(AuthError::UserNotFound)
    }

    async fn signup(&self, input: SignupInput) -> Result<User, AuthError> {
        let mut users = self
            .users
            .lock()
            .map_err(|_| AuthError::Internal("poisoned".to_string()))?;
        if users.values().any(|u| u.email == input.email) {
            return Err(AuthError::EmailTaken);
        }

        let user = User {
            uid: UserId(Uuid::new_v4()),
            email: input.email,
            name: String::new(),
            image_url: String::new(),
            website: String::new(),
            password_hash: input.password,
        };
        users.insert(user.uid, user.clone());
        Ok(user)
    }

    async fn signin(&self, input: SigninInput) -> Result<User, AuthError> {
        let users = self
            .users
            .lock()
            .map_err(|_| AuthError::Internal("poisoned".to_string()))?;
        users
            .values()
            .find(|u| u.email == input.email && u.password_hash == input.password)
            .cloned()
            .ok_or(AuthError::Unauthorized)
    }
}
