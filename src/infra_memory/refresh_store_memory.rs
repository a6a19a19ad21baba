use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

pub struct MemoryRefreshStore {
    entries: DashMap<UserId, (RefreshToken, DateTime<Utc>)>,
    clock: Arc<dyn Clock>,
}

impl MemoryRefreshStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MemoryRefreshStore {
            entries: DashMap::new(),
            clock,
        }
    }
}

#[async_trait::async_trait]
impl RefreshStore for MemoryRefreshStore {
    async fn store(
        &self,
        user_id: UserId,
        token: &RefreshToken,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let now = self.clock.now();
        // drop every expired entry, not only this user's
        self.entries.retain(|_, (_, expire_at)| *expire_at > now);
        self.entries.insert(user_id, (token.clone(), now + ttl));
        Ok(())
    }

    async fn fetch(&self, user_id: UserId) -> Result<Option<RefreshToken>, AuthError> {
        let now = self.clock.now();
        let entry = self.entries.get(&user_id).map(|e| e.value().clone());
        match entry {
            Some((token, expire_at)) if expire_at > now => Ok(Some(token)),
            Some(_) => {
                self.entries
                    .remove_if(&user_id, |_, (_, expire_at)| *expire_at <= now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn revoke(&self, user_id: UserId) -> Result<(), AuthError> {
        self.entries.remove(&user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::ManualClock;

    const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    fn token(s: &str) -> RefreshToken {
        RefreshToken(s.to_string())
    }

    #[tokio::test]
    async fn store_overwrites_previous_entry() {
        let store = MemoryRefreshStore::new(Arc::new(ManualClock::starting_now()));
        let id = UserId::new_random();

        store.store(id, &token("r1"), WEEK).await.unwrap();
        store.store(id, &token("r2"), WEEK).await.unwrap();

        assert_eq!(store.fetch(id).await.unwrap(), Some(token("r2")));
    }

    #[tokio::test]
    async fn revoke_removes_entry() {
        let store = MemoryRefreshStore::new(Arc::new(ManualClock::starting_now()));
        let id = UserId::new_random();
        let other = UserId::new_random();

        store.store(id, &token("r1"), WEEK).await.unwrap();
        store.store(other, &token("o1"), WEEK).await.unwrap();
        store.revoke(id).await.unwrap();

        assert_eq!(store.fetch(id).await.unwrap(), None);
        assert_eq!(store.fetch(other).await.unwrap(), Some(token("o1")));
    }

    #[tokio::test]
    async fn entries_expire_with_ttl() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = MemoryRefreshStore::new(clock.clone());
        let id = UserId::new_random();

        store
            .store(id, &token("r1"), Duration::from_secs(60))
            .await
            .unwrap();
        clock.advance(chrono::Duration::seconds(59));
        assert!(store.fetch(id).await.unwrap().is_some());

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(store.fetch(id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn store_sweeps_entries_of_other_expired_users() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = MemoryRefreshStore::new(clock.clone());
        let gone = UserId::new_random();
        let active = UserId::new_random();

        store
            .store(gone, &token("g1"), Duration::from_secs(60))
            .await
            .unwrap();
        clock.advance(chrono::Duration::seconds(61));
        store.store(active, &token("a1"), WEEK).await.unwrap();

        assert_eq!(store.entries.len(), 1);
        assert!(store.entries.contains_key(&active));
    }
}
