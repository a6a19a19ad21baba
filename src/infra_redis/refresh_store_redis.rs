use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, FromRedisValue, RedisResult, RedisWrite, ToRedisArgs, Value};
use std::future::Future;
use std::time::Duration;

pub struct RedisRefreshStore {
    conn: ConnectionManager,
    prefix: String,
    op_timeout: Duration,
}

impl RedisRefreshStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>, op_timeout: Duration) -> Self {
        RedisRefreshStore {
            conn,
            prefix: prefix.into(),
            op_timeout,
        }
    }

    fn key(&self, user_id: UserId) -> String {
        format!("{}:{}", self.prefix, user_id)
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = RedisResult<T>>,
    ) -> Result<T, AuthError> {
        bounded(op, self.op_timeout, fut).await
    }
}

/// A slow or unreachable Redis fails only the current call.
async fn bounded<T>(
    op: &'static str,
    op_timeout: Duration,
    fut: impl Future<Output = RedisResult<T>>,
) -> Result<T, AuthError> {
    match tokio::time::timeout(op_timeout, fut).await {
        Ok(result) => result.map_err(|e| AuthError::StoreUnavailable(format!("{op}: {e}"))),
        Err(_) => Err(AuthError::StoreUnavailable(format!(
            "{op}: timed out after {:?}",
            op_timeout
        ))),
    }
}

impl ToRedisArgs for RefreshToken {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        out.write_arg(self.0.as_bytes())
    }
}

impl FromRedisValue for RefreshToken {
    fn from_redis_value(v: &Value) -> RedisResult<Self> {
        let s: String = redis::from_redis_value(v)?;
        Ok(RefreshToken(s))
    }
}

#[async_trait::async_trait]
impl RefreshStore for RedisRefreshStore {
    async fn store(
        &self,
        user_id: UserId,
        token: &RefreshToken,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let key = self.key(user_id);
        let mut conn = self.conn.clone();
        let secs = ttl.as_secs().max(1);
        let _: () = self
            .bounded("set", conn.set_ex::<_, _, ()>(&key, token, secs))
            .await?;
        Ok(())
    }

    async fn fetch(&self, user_id: UserId) -> Result<Option<RefreshToken>, AuthError> {
        let key = self.key(user_id);
        let mut conn = self.conn.clone();
        self.bounded("get", conn.get::<_, Option<RefreshToken>>(&key))
            .await
    }

    async fn revoke(&self, user_id: UserId) -> Result<(), AuthError> {
        let key = self.key(user_id);
        let mut conn = self.conn.clone();
        let _: () = self.bounded("del", conn.del::<_, ()>(&key)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::{ErrorKind, RedisError};

    const TIMEOUT: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn slow_call_becomes_store_unavailable() {
        let result = bounded("get", TIMEOUT, std::future::pending::<RedisResult<()>>()).await;

        match result {
            Err(AuthError::StoreUnavailable(msg)) => assert!(msg.starts_with("get: timed out")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn redis_error_becomes_store_unavailable() {
        let failing = async {
            Err::<(), _>(RedisError::from((ErrorKind::IoError, "connection refused")))
        };

        let result = bounded("set", TIMEOUT, failing).await;

        assert!(matches!(result, Err(AuthError::StoreUnavailable(msg)) if msg.starts_with("set: ")));
    }

    #[tokio::test]
    async fn fast_call_passes_through() {
        let result = bounded("del", TIMEOUT, async { Ok::<_, RedisError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
