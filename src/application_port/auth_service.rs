use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing credential")]
    MissingCredential,
    #[error("invalid credential")]
    InvalidCredential,
    #[error("expired credential")]
    ExpiredCredential,
    #[error("unknown identity")]
    UnknownIdentity,
    #[error("forbidden")]
    Forbidden,
    #[error("refresh credential does not match the stored one")]
    RefreshMismatch,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("user already exists")]
    UserExists,
    #[error("validation error: {0}")]
    Validation(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Kinds that mean "the caller is not authenticated", as opposed to
    /// infrastructure or input problems.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthError::MissingCredential
                | AuthError::InvalidCredential
                | AuthError::ExpiredCredential
                | AuthError::UnknownIdentity
                | AuthError::RefreshMismatch
                | AuthError::InvalidCredentials
        )
    }
}

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Outcome of signup and login: the account plus a fresh token pair.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub profile: UserProfile,
    pub tokens: AuthTokens,
}

#[derive(Debug, Clone)]
pub struct TokenVerifyResult {
    pub user_id: UserId,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints and verifies the two credential kinds. Implementations are pure
/// functions of their secrets and clock.
pub trait TokenCodec: Send + Sync {
    fn issue_tokens(&self, user: UserId) -> Result<AuthTokens, AuthError>;
    fn issue_access_token(&self, user: UserId) -> Result<AccessGrant, AuthError>;
    fn verify_access_token(&self, token: &AccessToken) -> Result<TokenVerifyResult, AuthError>;
    fn verify_refresh_token(&self, token: &RefreshToken)
    -> Result<TokenVerifyResult, AuthError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn signup(&self, request: SignupInput) -> Result<SessionGrant, AuthError>;
    async fn login(&self, request: LoginInput) -> Result<SessionGrant, AuthError>;
    async fn logout(&self, refresh_token: Option<&str>) -> Result<(), AuthError>;
    async fn refresh(&self, refresh_token: Option<&str>) -> Result<AccessGrant, AuthError>;
    /// Resolve an access credential to the session it authorizes.
    async fn authenticate(&self, access_token: Option<&str>) -> Result<Session, AuthError>;
}
