use crate::application_port::AuthError;
use crate::domain_model::{User, UserId};
use crate::domain_port::UserRepo;
use crate::logger::*;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const PG_UNIQUE_VIOLATION: &str = "23505";

pub struct PgUserRepo {
    pool: PgPool,
}

impl PgUserRepo {
    pub fn new(pool: PgPool) -> Self {
        PgUserRepo { pool }
    }
}

fn user_from_row(row: PgRow) -> User {
    User {
        uid: row.get("uid"),
        email: row.get("email"),
        name: row.get::<Option<String>, _>("name").unwrap_or_default(),
        image_url: row.get::<Option<String>, _>("image_url").unwrap_or_default(),
        website: row.get::<Option<String>, _>("website").unwrap_or_default(),
        password_hash: row.get("password"),
    }
}

#[async_trait::async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, uid: UserId) -> Result<User, AuthError> {
        sqlx::query(
            r#"
SELECT uid, email, name, image_url, website, password
FROM users
WHERE uid = $1
"#,
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Internal(format!("query user by id: {e}")))?
        .map(user_from_row)
        .ok_or(AuthError::UserNotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, AuthError> {
        sqlx::query(
            r#"
SELECT uid, email, name, image_url, website, password
FROM users
WHERE email = $1
"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Internal(format!("query user by email: {e}")))?
        .map(user_from_row)
        .ok_or(AuthError::UserNotFound)
    }

    async fn create(&self, user: &User) -> Result<(), AuthError> {
        sqlx::query(
            r#"
INSERT INTO users (uid, email, password)
VALUES ($1, $2, $3)
"#,
        )
        .bind(user.uid)
        .bind(&user.email)
        .bind(&user.password_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(PG_UNIQUE_VIOLATION) => {
                warn!(email = %user.email, "email already registered");
                AuthError::EmailTaken
            }
            _ => AuthError::Internal(format!("insert user: {e}")),
        })?;

        Ok(())
    }
}
