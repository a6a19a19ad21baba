use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use std::sync::Arc;

pub struct MemoryUserRepo {
    by_id: DashMap<UserId, UserRecord>,
    by_email: DashMap<String, UserId>,
    clock: Arc<dyn Clock>,
}

impl MemoryUserRepo {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MemoryUserRepo {
            by_id: DashMap::new(),
            by_email: DashMap::new(),
            clock,
        }
    }

    /// Drop an account, the way an external deletion would.
    pub fn remove(&self, user_id: UserId) -> Option<UserRecord> {
        let (_, record) = self.by_id.remove(&user_id)?;
        self.by_email.remove(&record.email);
        Some(record)
    }

    pub fn set_role(&self, user_id: UserId, role: Role) -> bool {
        match self.by_id.get_mut(&user_id) {
            Some(mut record) => {
                record.role = role;
                true
            }
            None => false,
        }
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn create(&self, user: NewUser) -> Result<UserRecord, AuthError> {
        let owner = *self
            .by_email
            .entry(user.email.clone())
            .or_insert(user.user_id);
        if owner != user.user_id {
            return Err(AuthError::UserExists);
        }

        let record = UserRecord {
            user_id: user.user_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: self.clock.now(),
        };
        self.by_id.insert(record.user_id, record.clone());
        Ok(record)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        let Some(user_id) = self.by_email.get(email).map(|id| *id) else {
            return Ok(None);
        };
        self.get_by_id(user_id).await
    }

    async fn get_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.by_id.get(&user_id).map(|r| r.value().clone()))
    }
}
