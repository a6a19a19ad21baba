use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshToken(pub String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl RefreshToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessGrant {
    pub access_token: AccessToken,
    pub expires_at: DateTime<Utc>,
}
