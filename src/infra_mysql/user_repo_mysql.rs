use super::util::is_dup_key;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

/// Schema lives in `schema/user.sql`.
pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    #[inline]
    fn uid_as_bytes(id: &UserId) -> &[u8] {
        id.0.as_bytes()
    }

    #[inline]
    fn uid_from_bytes(id: &[u8]) -> Result<UserId, AuthError> {
        Ok(UserId(
            Uuid::from_slice(id).map_err(|e| AuthError::StoreUnavailable(e.to_string()))?,
        ))
    }

    fn row_to_record(row: MySqlRow) -> Result<UserRecord, AuthError> {
        let store_err = |e: sqlx::Error| AuthError::StoreUnavailable(e.to_string());

        let user_id_bytes: Vec<u8> = row.try_get("user_id").map_err(store_err)?;
        let user_id = Self::uid_from_bytes(&user_id_bytes)?;

        let name: String = row.try_get("name").map_err(store_err)?;
        let email: String = row.try_get("email").map_err(store_err)?;
        let password_hash: String = row.try_get("password_hash").map_err(store_err)?;
        let role: String = row.try_get("role").map_err(store_err)?;
        let role = role
            .parse::<Role>()
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(store_err)?;

        Ok(UserRecord {
            user_id,
            name,
            email,
            password_hash,
            role,
            created_at,
        })
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn create(&self, user: NewUser) -> Result<UserRecord, AuthError> {
        sqlx::query(
            r#"
INSERT INTO user (user_id, name, email, password_hash, role)
VALUES (?, ?, ?, ?, ?)
"#,
        )
        .bind(Self::uid_as_bytes(&user.user_id))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                AuthError::UserExists
            } else {
                AuthError::StoreUnavailable(e.to_string())
            }
        })?;

        self.get_by_id(user.user_id)
            .await?
            .ok_or_else(|| AuthError::InternalError("inserted user vanished".to_string()))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT user_id, name, email, password_hash, role, created_at
FROM user
WHERE email = ?
"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::StoreUnavailable(e.to_string()))?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn get_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT user_id, name, email, password_hash, role, created_at
FROM user
WHERE user_id = ?
"#,
        )
        .bind(Self::uid_as_bytes(&user_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::StoreUnavailable(e.to_string()))?;

        row_opt.map(Self::row_to_record).transpose()
    }
}
