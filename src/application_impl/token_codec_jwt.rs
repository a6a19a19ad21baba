use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::Clock;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
}

impl JwtConfig {
    pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);
    pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    pub fn validate(&self) -> Result<(), AuthError> {
        if self.access_secret.is_empty() || self.refresh_secret.is_empty() {
            return Err(AuthError::InternalError(
                "signing secrets must not be empty".to_string(),
            ));
        }
        if self.access_secret == self.refresh_secret {
            return Err(AuthError::InternalError(
                "access and refresh secrets must differ".to_string(),
            ));
        }
        if self.access_ttl >= self.refresh_ttl {
            return Err(AuthError::InternalError(
                "access ttl must be shorter than refresh ttl".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // user id as string
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String,
}

/// HS256 codec with one secret per credential kind. Expiry is judged against
/// the injected clock rather than the system time.
pub struct JwtHs256Codec {
    cfg: JwtConfig,
    clock: Arc<dyn Clock>,
}

impl JwtHs256Codec {
    pub fn try_new(cfg: JwtConfig, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        cfg.validate()?;
        Ok(JwtHs256Codec { cfg, clock })
    }

    #[inline]
    fn gen_jti() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    #[inline]
    fn parse_user_id(sub: &str) -> Result<UserId, AuthError> {
        sub.parse::<UserId>().map_err(|_| AuthError::InvalidCredential)
    }

    fn encode(
        &self,
        uid: UserId,
        ttl: Duration,
        secret: &[u8],
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        let iat_dt = self.clock.now();
        let exp_dt = iat_dt + ttl;
        let claims = Claims {
            sub: uid.0.to_string(),
            exp: exp_dt.timestamp(),
            iat: iat_dt.timestamp(),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            jti: Self::gen_jti(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .map_err(|e| AuthError::InternalError(e.to_string()))?;
        Ok((token, exp_dt))
    }

    fn decode(&self, token: &str, secret: &[u8]) -> Result<TokenVerifyResult, AuthError> {
        let mut v = Validation::new(Algorithm::HS256);
        // exp is checked below against our clock; it still has to be present
        v.validate_exp = false;
        v.set_required_spec_claims(&["exp", "sub"]);
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);
        let data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &v).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredCredential,
                _ => AuthError::InvalidCredential,
            },
        )?;
        let claims = data.claims;

        if claims.exp <= self.clock.now().timestamp() {
            return Err(AuthError::ExpiredCredential);
        }
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(AuthError::InvalidCredential)?;

        Ok(TokenVerifyResult {
            user_id: Self::parse_user_id(&claims.sub)?,
            jti: claims.jti,
            expires_at,
        })
    }
}

impl TokenCodec for JwtHs256Codec {
    fn issue_tokens(&self, user: UserId) -> Result<AuthTokens, AuthError> {
        let (access, access_exp) =
            self.encode(user, self.cfg.access_ttl, &self.cfg.access_secret)?;
        let (refresh, refresh_exp) =
            self.encode(user, self.cfg.refresh_ttl, &self.cfg.refresh_secret)?;
        Ok(AuthTokens {
            access_token: AccessToken(access),
            refresh_token: RefreshToken(refresh),
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
        })
    }

    fn issue_access_token(&self, user: UserId) -> Result<AccessGrant, AuthError> {
        let (token, expires_at) =
            self.encode(user, self.cfg.access_ttl, &self.cfg.access_secret)?;
        Ok(AccessGrant {
            access_token: AccessToken(token),
            expires_at,
        })
    }

    fn verify_access_token(&self, token: &AccessToken) -> Result<TokenVerifyResult, AuthError> {
        self.decode(&token.0, &self.cfg.access_secret)
    }

    fn verify_refresh_token(
        &self,
        token: &RefreshToken,
    ) -> Result<TokenVerifyResult, AuthError> {
        self.decode(&token.0, &self.cfg.refresh_secret)
    }
}
