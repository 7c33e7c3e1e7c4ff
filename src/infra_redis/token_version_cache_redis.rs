use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_KEY_PREFIX: &str = "access:user";

/// Stores `<prefix>:<user_id> -> <token_id>` with the access token lifetime as TTL.
pub struct RedisTokenVersionCache {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisTokenVersionCache {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisTokenVersionCache {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, user_id: UserId) -> String {
        format!("{}:{}", self.prefix, user_id)
    }
}

fn cache_err(e: redis::RedisError) -> AuthError {
    AuthError::Store(format!("token cache: {}", e))
}

#[async_trait::async_trait]
impl TokenVersionCache for RedisTokenVersionCache {
    async fn set_current_version(
        &self,
        user_id: UserId,
        token_id: TokenId,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let key = self.key(user_id);
        let mut conn = self.conn.clone();
        // SETEX rejects a zero TTL.
        let _: () = conn
            .set_ex(&key, token_id.to_string(), ttl.as_secs().max(1))
            .await
            .map_err(cache_err)?;
        Ok(())
    }

    async fn is_current_version(
        &self,
        user_id: UserId,
        token_id: TokenId,
    ) -> Result<bool, AuthError> {
        let key = self.key(user_id);
        let mut conn = self.conn.clone();
        let current: Option<String> = conn.get(&key).await.map_err(cache_err)?;

        match current {
            Some(current) => Ok(current == token_id.to_string()),
            None => {
                debug!(%user_id, "no current access token version");
                Ok(false)
            }
        }
    }

    async fn invalidate(&self, user_id: UserId) -> Result<(), AuthError> {
        let key = self.key(user_id);
        let mut conn = self.conn.clone();
        let _: () = conn.del(&key).await.map_err(cache_err)?;
        Ok(())
    }
}
