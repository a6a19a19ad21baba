use super::coordinator::{RefreshCoordinator, SessionRefresher};
use super::error::ClientError;
use crate::domain_model::UserProfile;
use crate::logger::*;
use anyhow::Context;
use reqwest::{Client, Method, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    user: UserProfile,
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let code = response
            .json::<Envelope<serde_json::Value>>()
            .await
            .ok()
            .and_then(|envelope| envelope.error)
            .map(|error| error.code);
        return Err(ClientError::Status { status, code });
    }

    let envelope: Envelope<T> = response
        .json()
        .await
        .map_err(|e| ClientError::Decode(e.to_string()))?;
    envelope
        .data
        .ok_or_else(|| ClientError::Decode("response carried no data".to_string()))
}

/// Client-side view of who is logged in.
#[derive(Debug, Default)]
pub struct SessionState {
    user: RwLock<Option<UserProfile>>,
}

impl SessionState {
    pub async fn user(&self) -> Option<UserProfile> {
        self.user.read().await.clone()
    }

    async fn set(&self, user: UserProfile) {
        *self.user.write().await = Some(user);
    }

    async fn clear(&self) {
        *self.user.write().await = None;
    }
}

/// Calls the refresh endpoint directly, never through the coordinator.
struct HttpSessionRefresher {
    http: Client,
    base_url: String,
    session: Arc<SessionState>,
}

#[async_trait::async_trait]
impl SessionRefresher for HttpSessionRefresher {
    async fn refresh(&self) -> Result<(), ClientError> {
        let response = self
            .http
            .post(format!("{}/auth/refresh-token", self.base_url))
            .send()
            .await?;
        decode::<serde_json::Value>(response).await.map(|_| ())
    }

    async fn clear_session(&self) {
        self.session.clear().await;
        info!("local session cleared");
    }
}

/// HTTP client for the storefront API. Credentials travel in the cookie jar;
/// protected calls go through a [`RefreshCoordinator`].
pub struct StorefrontClient {
    http: Client,
    base_url: String,
    session: Arc<SessionState>,
    coordinator: RefreshCoordinator,
}

impl StorefrontClient {
    /// `base_url` is the API root, e.g. `https://shop.example/api/v1`.
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self::with_http_client(http, base_url))
    }

    /// The client must have its cookie store enabled.
    pub fn with_http_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let session = Arc::new(SessionState::default());
        let refresher = Arc::new(HttpSessionRefresher {
            http: http.clone(),
            base_url: base_url.clone(),
            session: session.clone(),
        });
        Self {
            http,
            base_url,
            session,
            coordinator: RefreshCoordinator::new(refresher),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn current_user(&self) -> Option<UserProfile> {
        self.session.user().await
    }

    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, ClientError> {
        let response = self
            .http
            .post(self.url("auth/signup"))
            .json(&json!({ "name": name, "email": email, "password": password }))
            .send()
            .await?;
        let body: SessionBody = decode(response).await?;
        self.session.set(body.user.clone()).await;
        Ok(body.user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, ClientError> {
        let response = self
            .http
            .post(self.url("auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body: SessionBody = decode(response).await?;
        self.session.set(body.user.clone()).await;
        Ok(body.user)
    }

    /// Local state is dropped even if the server call fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = async {
            let response = self.http.post(self.url("auth/logout")).send().await?;
            decode::<serde_json::Value>(response).await.map(|_| ())
        }
        .await;
        self.session.clear().await;
        result
    }

    pub async fn profile(&self) -> Result<UserProfile, ClientError> {
        let user: UserProfile = self.get("auth/profile").await?;
        self.session.set(user.clone()).await;
        Ok(user)
    }

    /// Ask the server who we are; forget the local user if it cannot say.
    pub async fn check_auth(&self) -> Option<UserProfile> {
        match self.profile().await {
            Ok(user) => Some(user),
            Err(e) => {
                debug!(error = %e, "not authenticated");
                self.session.clear().await;
                None
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(Method::GET, path).await
    }

    /// Any protected call: a 401 triggers one shared refresh and a replay.
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
    ) -> Result<T, ClientError> {
        let url = self.url(path);
        self.coordinator
            .execute(|| {
                let request = self.http.request(method.clone(), url.as_str());
                async move { decode::<T>(request.send().await?).await }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api;
    use crate::application_impl::{JwtConfig, JwtHs256Codec, ManualClock, RealAuthService};
    use crate::application_port::*;
    use crate::domain_model::*;
    use crate::infra_memory::{MemoryRefreshStore, MemoryUserRepo};
    use crate::server::Server;
    use futures_util::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use warp::Filter;

    struct PlainHasher;

    #[async_trait::async_trait]
    impl CredentialHasher for PlainHasher {
        async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
            Ok(format!("plain:{password}"))
        }

        async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
            Ok(hash == format!("plain:{password}"))
        }
    }

    /// Counts refresh calls reaching the server.
    struct CountingAuth {
        inner: RealAuthService,
        refreshes: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AuthService for CountingAuth {
        async fn signup(&self, request: SignupInput) -> Result<SessionGrant, AuthError> {
            self.inner.signup(request).await
        }

        async fn login(&self, request: LoginInput) -> Result<SessionGrant, AuthError> {
            self.inner.login(request).await
        }

        async fn logout(&self, refresh_token: Option<&str>) -> Result<(), AuthError> {
            self.inner.logout(refresh_token).await
        }

        async fn refresh(&self, refresh_token: Option<&str>) -> Result<AccessGrant, AuthError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            // long enough for every concurrent 401 to land first
            tokio::time::sleep(Duration::from_millis(200)).await;
            self.inner.refresh(refresh_token).await
        }

        async fn authenticate(&self, access_token: Option<&str>) -> Result<Session, AuthError> {
            self.inner.authenticate(access_token).await
        }
    }

    struct Running {
        base_url: String,
        clock: Arc<ManualClock>,
        auth: Arc<CountingAuth>,
    }

    fn start_server() -> Running {
        let clock = Arc::new(ManualClock::starting_now());
        let codec = JwtHs256Codec::try_new(
            JwtConfig {
                issuer: "storefront.auth".to_string(),
                audience: "storefront-web".to_string(),
                access_ttl: JwtConfig::DEFAULT_ACCESS_TTL,
                refresh_ttl: JwtConfig::DEFAULT_REFRESH_TTL,
                access_secret: b"access-secret".to_vec(),
                refresh_secret: b"refresh-secret".to_vec(),
            },
            clock.clone(),
        )
        .unwrap();
        let auth = Arc::new(CountingAuth {
            inner: RealAuthService::new(
                Arc::new(MemoryUserRepo::new(clock.clone())),
                Arc::new(PlainHasher),
                Arc::new(codec),
                Arc::new(MemoryRefreshStore::new(clock.clone())),
                clock.clone(),
            ),
            refreshes: AtomicUsize::new(0),
        });
        let cookies = api::v1::CookiePolicy {
            secure: false,
            access_max_age: JwtConfig::DEFAULT_ACCESS_TTL,
            refresh_max_age: JwtConfig::DEFAULT_REFRESH_TTL,
        };
        let server = Arc::new(Server::from_parts(auth.clone(), cookies));
        let routes = warp::path("api")
            .and(warp::path("v1"))
            .and(api::v1::routes(server))
            .recover(api::v1::recover_error);

        let (address, serving) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(serving);

        Running {
            base_url: format!("http://{address}/api/v1"),
            clock,
            auth,
        }
    }

    #[tokio::test]
    async fn expired_session_is_refreshed_once_for_concurrent_calls() {
        let running = start_server();
        let client = StorefrontClient::new(&running.base_url).unwrap();

        let user = client
            .signup("Ada", "ada@example.com", "hunter22")
            .await
            .unwrap();
        assert_eq!(client.current_user().await, Some(user.clone()));

        running.clock.advance(chrono::Duration::minutes(16));
        let results = join_all((0..4).map(|_| client.profile())).await;

        for result in results {
            assert_eq!(result.unwrap().id, user.id);
        }
        assert_eq!(running.auth.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_logs_the_client_out() {
        let running = start_server();
        let client = StorefrontClient::new(&running.base_url).unwrap();
        client
            .signup("Ada", "ada@example.com", "hunter22")
            .await
            .unwrap();

        // a login elsewhere replaces the stored refresh credential
        let other = StorefrontClient::new(&running.base_url).unwrap();
        other.login("ada@example.com", "hunter22").await.unwrap();

        running.clock.advance(chrono::Duration::minutes(16));
        let err = client.profile().await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(err.code(), Some("ExpiredCredential"));
        assert_eq!(client.current_user().await, None);
        assert!(other.current_user().await.is_some());
    }

    #[tokio::test]
    async fn logout_forgets_the_session() {
        let running = start_server();
        let client = StorefrontClient::new(&running.base_url).unwrap();
        client
            .signup("Ada", "ada@example.com", "hunter22")
            .await
            .unwrap();

        client.logout().await.unwrap();

        assert_eq!(client.current_user().await, None);
        assert_eq!(client.check_auth().await, None);
        assert_eq!(running.auth.refreshes.load(Ordering::SeqCst), 1);
    }
}
