use crate::api::v1::DeadlineConfig;
use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_pg::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::{Settings, Token};
use anyhow::Context;
use sqlx::PgPool;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

pub struct Server {
    pub user_service: Arc<dyn UserService>,
    pub token_service: Arc<dyn TokenService>,
    pub deadline: DeadlineConfig,
    pool: Option<PgPool>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let mut pool = None;

        let user_service: Arc<dyn UserService> = match settings.user.backend.as_str() {
            "fake" => Arc::new(FakeUserService::new()),
            "real" => {
                let pg = PgPool::connect(&settings.pg.dsn)
                    .await
                    .context("connecting to postgres")?;
                pool = Some(pg.clone());
                let user_repo: Arc<dyn UserRepo> = Arc::new(PgUserRepo::new(pg));
                let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);
                Arc::new(RealUserService::new(user_repo, credential_hasher))
            }
            other => return Err(anyhow::anyhow!("Unknown user backend: {}", other)),
        };

        let token_service: Arc<dyn TokenService> = match settings.auth.backend.as_str() {
            "fake" => Arc::new(FakeTokenService::new()),
            "real" => {
                let redis_client = redis::Client::open(settings.redis.dsn.as_str())
                    .context("parsing redis dsn")?;
                let redis_manager = redis_client
                    .get_connection_manager()
                    .await
                    .context("connecting to redis")?;
                let store: Arc<dyn TokenStore> = Arc::new(RedisTokenStore::new(redis_manager));

                let keys = load_key_material(&settings.token)?;
                Arc::new(RealTokenService::new(
                    store,
                    TokenConfig {
                        keys,
                        id_ttl: Duration::from_secs(settings.token.id_ttl_secs),
                        refresh_ttl: Duration::from_secs(settings.token.refresh_ttl_secs),
                    },
                ))
            }
            other => return Err(anyhow::anyhow!("Unknown auth backend: {}", other)),
        };

        let deadline = DeadlineConfig::new(Duration::from_secs(settings.http.handler_timeout_secs));

        info!("server started");

        Ok(Self {
            user_service,
            token_service,
            deadline,
            pool,
        })
    }

    /// Direct wiring, used by route tests to stand a server up without
    /// external backends.
    pub fn with_services(
        user_service: Arc<dyn UserService>,
        token_service: Arc<dyn TokenService>,
        deadline: DeadlineConfig,
    ) -> Self {
        Self {
            user_service,
            token_service,
            deadline,
            pool: None,
        }
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

fn load_key_material(token: &Token) -> anyhow::Result<KeyMaterial> {
    let private_pem = fs::read(&token.rsa_private_key_file)
        .with_context(|| format!("reading rsa private key {:?}", token.rsa_private_key_file))?;
    let public_pem = fs::read(&token.rsa_public_key_file)
        .with_context(|| format!("reading rsa public key {:?}", token.rsa_public_key_file))?;
    KeyMaterial::new(&private_pem, &public_pem, token.refresh_secret.as_bytes())
        .context("parsing rsa key material")
}
