use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Process-local stand-in for the Redis version cache. Entries expire
/// against the injected clock.
pub struct MemoryTokenVersionCache {
    entries: DashMap<UserId, (TokenId, DateTime<Utc>)>,
    clock: Arc<dyn Clock>,
}

impl MemoryTokenVersionCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MemoryTokenVersionCache {
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn current_version(&self, user_id: UserId) -> Option<TokenId> {
        let now = self.clock.now();
        self.entries
            .get(&user_id)
            .filter(|entry| entry.1 > now)
            .map(|entry| entry.0)
    }
}

#[async_trait::async_trait]
impl TokenVersionCache for MemoryTokenVersionCache {
    async fn set_current_version(
        &self,
        user_id: UserId,
        token_id: TokenId,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        let expires_at = self.clock.now() + ttl;
        self.entries.insert(user_id, (token_id, expires_at));
        Ok(())
    }

    async fn is_current_version(
        &self,
        user_id: UserId,
        token_id: TokenId,
    ) -> Result<bool, AuthError> {
        Ok(self.current_version(user_id) == Some(token_id))
    }

    async fn invalidate(&self, user_id: UserId) -> Result<(), AuthError> {
        self.entries.remove(&user_id);
        Ok(())
    }
}
