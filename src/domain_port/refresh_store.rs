use crate::application_port::*;
use crate::domain_model::*;
use std::time::Duration;

/// One live refresh credential per user. Backend failures must come back as
/// `AuthError::StoreUnavailable` so callers can tell them apart from a
/// missing session.
#[async_trait::async_trait]
pub trait RefreshStore: Send + Sync {
    /// Overwrites any previous entry for `user_id`. The entry expires after `ttl`.
    async fn store(
        &self,
        user_id: UserId,
        token: &RefreshToken,
        ttl: Duration,
    ) -> Result<(), AuthError>;
    async fn fetch(&self, user_id: UserId) -> Result<Option<RefreshToken>, AuthError>;
    async fn revoke(&self, user_id: UserId) -> Result<(), AuthError>;
}
