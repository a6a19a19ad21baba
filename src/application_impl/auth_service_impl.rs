use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    refresh_store: Arc<dyn RefreshStore>,
    clock: Arc<dyn Clock>,
    min_password_len: usize,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        refresh_store: Arc<dyn RefreshStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_repo,
            credential_hasher,
            token_codec,
            refresh_store,
            clock,
            min_password_len: 6,
        }
    }

    fn validate_signup(&self, name: &str, email: &str, password: &str) -> Result<(), AuthError> {
        if name.trim().is_empty() {
            return Err(AuthError::Validation("name is required".to_string()));
        }
        if !is_plausible_email(email) {
            return Err(AuthError::Validation("please enter a valid email".to_string()));
        }
        if password.len() < self.min_password_len {
            return Err(AuthError::Validation(format!(
                "password must be at least {} characters",
                self.min_password_len
            )));
        }
        Ok(())
    }

    fn ttl_until(&self, until: DateTime<Utc>) -> Duration {
        let secs = (until - self.clock.now()).num_seconds();
        if secs <= 0 {
            Duration::from_secs(1)
        } else {
            Duration::from_secs(secs as u64)
        }
    }

    /// Mint a pair and make the refresh half the only live one for `user_id`.
    async fn open_session(&self, user_id: UserId) -> Result<AuthTokens, AuthError> {
        let tokens = self.token_codec.issue_tokens(user_id)?;
        let ttl = self.ttl_until(tokens.refresh_token_expires_at);
        self.refresh_store
            .store(user_id, &tokens.refresh_token, ttl)
            .await?;
        Ok(tokens)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && tld.len() >= 2 && !tld.ends_with('.'))
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn signup(&self, request: SignupInput) -> Result<SessionGrant, AuthError> {
        let SignupInput {
            name,
            email,
            password,
        } = request;
        let email = normalize_email(&email);

        self.validate_signup(&name, &email, &password)?;

        if self.user_repo.get_by_email(&email).await?.is_some() {
            return Err(AuthError::UserExists);
        }

        let password_hash = self.credential_hasher.hash_password(&password).await?;
        let record = self
            .user_repo
            .create(NewUser {
                user_id: UserId::new_random(),
                name: name.trim().to_string(),
                email,
                password_hash,
                role: Role::Customer,
            })
            .await?;

        let tokens = self.open_session(record.user_id).await?;
        info!(user_id = %record.user_id, "user signed up");

        Ok(SessionGrant {
            profile: record.profile(),
            tokens,
        })
    }

    async fn login(&self, request: LoginInput) -> Result<SessionGrant, AuthError> {
        let LoginInput { email, password } = request;
        let email = normalize_email(&email);

        let rec = self
            .user_repo
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let ok = self
            .credential_hasher
            .verify_password(&password, &rec.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.open_session(rec.user_id).await?;
        info!(user_id = %rec.user_id, "user logged in");

        Ok(SessionGrant {
            profile: rec.profile(),
            tokens,
        })
    }

    async fn logout(&self, refresh_token: Option<&str>) -> Result<(), AuthError> {
        let Some(raw) = refresh_token else {
            return Ok(());
        };

        match self
            .token_codec
            .verify_refresh_token(&RefreshToken(raw.to_string()))
        {
            Ok(verified) => {
                self.refresh_store.revoke(verified.user_id).await?;
                info!(user_id = %verified.user_id, jti = %verified.jti, "refresh credential revoked");
            }
            // an expired entry has already left the store with its ttl
            Err(e) => debug!(error = %e, "logout with unusable refresh credential"),
        }
        Ok(())
    }

    async fn refresh(&self, refresh_token: Option<&str>) -> Result<AccessGrant, AuthError> {
        let presented = RefreshToken(
            refresh_token
                .ok_or(AuthError::MissingCredential)?
                .to_string(),
        );
        let verified = self.token_codec.verify_refresh_token(&presented)?;
        let user_id = verified.user_id;

        match self.refresh_store.fetch(user_id).await? {
            Some(stored) if stored == presented => {}
            _ => {
                warn!(%user_id, "refresh credential does not match the stored one");
                return Err(AuthError::RefreshMismatch);
            }
        }

        if self.user_repo.get_by_id(user_id).await?.is_none() {
            return Err(AuthError::UnknownIdentity);
        }
        debug!(%user_id, jti = %verified.jti, "refresh credential accepted");

        self.token_codec.issue_access_token(user_id)
    }

    async fn authenticate(&self, access_token: Option<&str>) -> Result<Session, AuthError> {
        let token = AccessToken(access_token.ok_or(AuthError::MissingCredential)?.to_string());
        let verified = self.token_codec.verify_access_token(&token)?;

        let user = self
            .user_repo
            .get_by_id(verified.user_id)
            .await?
            .ok_or(AuthError::UnknownIdentity)?;

        Ok(Session {
            user: user.profile(),
        })
    }
}
