use crate::api::v1::CookiePolicy;
use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::anyhow;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use std::time::Duration;

/// Composition root: every backend is picked here and handed to the HTTP
/// layer as a trait object.
pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub cookies: CookiePolicy,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let jwt_config = JwtConfig {
            issuer: settings.auth.issuer.clone(),
            audience: settings.auth.audience.clone(),
            access_ttl: Duration::from_secs(settings.auth.access_ttl_secs),
            refresh_ttl: Duration::from_secs(settings.auth.refresh_ttl_secs),
            access_secret: settings.auth.access_secret.clone().into_bytes(),
            refresh_secret: settings.auth.refresh_secret.clone().into_bytes(),
        };
        let token_codec: Arc<dyn TokenCodec> =
            Arc::new(JwtHs256Codec::try_new(jwt_config, clock.clone())?);

        let refresh_store: Arc<dyn RefreshStore> =
            match settings.refresh_store.backend.as_str() {
                "memory" => Arc::new(MemoryRefreshStore::new(clock.clone())),
                "redis" => {
                    let url = settings
                        .refresh_store
                        .redis_url
                        .as_deref()
                        .ok_or_else(|| anyhow!("refresh_store.redis_url is required"))?;
                    let redis_client = redis::Client::open(url)?;
                    let redis_manager = redis_client.get_connection_manager().await?;
                    Arc::new(RedisRefreshStore::new(
                        redis_manager,
                        settings.refresh_store.prefix.clone(),
                        Duration::from_millis(settings.refresh_store.op_timeout_ms),
                    ))
                }
                other => return Err(anyhow!("Unknown refresh store backend: {}", other)),
            };

        let mut pool = None;
        let user_repo: Arc<dyn UserRepo> = match settings.user.backend.as_str() {
            "memory" => Arc::new(MemoryUserRepo::new(clock.clone())),
            "mysql" => {
                let url = settings
                    .user
                    .mysql_url
                    .as_deref()
                    .ok_or_else(|| anyhow!("user.mysql_url is required"))?;
                let mysql_pool = Pool::<MySql>::connect(url).await?;
                pool = Some(mysql_pool.clone());
                Arc::new(MySqlUserRepo::new(mysql_pool))
            }
            other => return Err(anyhow!("Unknown user backend: {}", other)),
        };

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            user_repo,
            credential_hasher,
            token_codec,
            refresh_store,
            clock,
        ));

        let cookies = CookiePolicy {
            secure: settings.http.secure_cookies,
            access_max_age: Duration::from_secs(settings.auth.access_ttl_secs),
            refresh_max_age: Duration::from_secs(settings.auth.refresh_ttl_secs),
        };

        info!(
            refresh_store = %settings.refresh_store.backend,
            user = %settings.user.backend,
            "server started"
        );

        Ok(Self {
            auth_service,
            cookies,
            pool,
        })
    }

    /// Assemble a server around an already-built service.
    pub fn from_parts(auth_service: Arc<dyn AuthService>, cookies: CookiePolicy) -> Self {
        Self {
            auth_service,
            cookies,
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
