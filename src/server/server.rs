use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::{Context, anyhow};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use std::time::Duration;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let argon2 = &settings.jwt.argon2;
        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(
            Argon2PasswordHasher::with_cost(argon2.memory_kib, argon2.iterations, argon2.parallelism)?,
        );

        let jwt_config = JwtConfig {
            issuer: settings.jwt.issuer.clone(),
            access_ttl: Duration::from_secs(settings.jwt.access_ttl_secs),
            refresh_ttl: Duration::from_secs(settings.jwt.refresh_ttl_secs),
            refresh_secret_len: settings.jwt.refresh_secret_len,
            signing_key: settings.jwt.secret.clone().into_bytes(),
        };
        debug!(?jwt_config);
        let token_codec: Arc<dyn TokenCodec> =
            Arc::new(JwtHs256Codec::new(&jwt_config, clock.clone())?);

        let mut pool = None;
        let (user_repo, refresh_repo): (Arc<dyn UserRepo>, Arc<dyn RefreshTokenRepo>) =
            match settings.storage.backend.as_str() {
                "memory" => {
                    warn!("using in-memory storage, data is lost on restart");
                    (
                        Arc::new(MemoryUserRepo::new(clock.clone())),
                        Arc::new(MemoryRefreshTokenRepo::new(clock.clone())),
                    )
                }
                "mysql" => {
                    let url = settings
                        .storage
                        .database_url
                        .as_deref()
                        .ok_or_else(|| anyhow!("storage.database_url is required for mysql"))?;
                    let mysql = MySqlPoolOptions::new()
                        .max_connections(settings.storage.max_connections)
                        .connect(url)
                        .await
                        .context("connecting to mysql")?;
                    pool = Some(mysql.clone());
                    (
                        Arc::new(MySqlUserRepo::new(mysql.clone())),
                        Arc::new(MySqlRefreshTokenRepo::new(mysql)),
                    )
                }
                other => return Err(anyhow!("Unknown storage backend: {}", other)),
            };

        let version_cache: Arc<dyn TokenVersionCache> = match settings.cache.backend.as_str() {
            "memory" => Arc::new(MemoryTokenVersionCache::new(clock.clone())),
            "redis" => {
                let url = settings
                    .cache
                    .redis_url
                    .as_deref()
                    .ok_or_else(|| anyhow!("cache.redis_url is required for redis"))?;
                let redis_client = redis::Client::open(url)?;
                let redis_manager = redis_client
                    .get_connection_manager()
                    .await
                    .context("connecting to redis")?;
                Arc::new(RedisTokenVersionCache::new(
                    redis_manager,
                    settings.cache.key_prefix.clone(),
                ))
            }
            other => return Err(anyhow!("Unknown cache backend: {}", other)),
        };

        let token_service: Arc<dyn TokenService> = Arc::new(RealTokenService::new(
            token_codec,
            version_cache,
            refresh_repo,
            user_repo.clone(),
            credential_hasher.clone(),
            clock,
            TokenLifetimes::from(&jwt_config),
        ));

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            user_repo,
            credential_hasher,
            token_service,
        ));

        let bootstrap = &settings.bootstrap;
        if !bootstrap.admin_username.trim().is_empty() {
            auth_service
                .bootstrap_admin(AdminBootstrap {
                    username: bootstrap.admin_username.clone(),
                    email: bootstrap.admin_email.clone(),
                    password: bootstrap.admin_password.clone(),
                })
                .await?;
        }

        info!("server started");

        Ok(Self {
            auth_service,
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
