use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

pub struct MemoryRefreshTokenRepo {
    records: DashMap<TokenId, RefreshTokenRecord>,
    clock: Arc<dyn Clock>,
}

impl MemoryRefreshTokenRepo {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MemoryRefreshTokenRepo {
            records: DashMap::new(),
            clock,
        }
    }

    pub fn records_for_user(&self, user_id: UserId) -> Vec<RefreshTokenRecord> {
        self.records
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.value().clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl RefreshTokenRepo for MemoryRefreshTokenRepo {
    async fn create(&self, token: &NewRefreshToken) -> Result<(), AuthError> {
        if self.records.contains_key(&token.token_id) {
            return Err(AuthError::Store(format!(
                "duplicate refresh token id {}",
                token.token_id
            )));
        }
        self.records.insert(
            token.token_id,
            RefreshTokenRecord {
                token_id: token.token_id,
                user_id: token.user_id,
                secret_hash: token.secret_hash.clone(),
                expires_at: token.expires_at,
                revoked: false,
                revoked_at: None,
                created_at: self.clock.now(),
            },
        );
        Ok(())
    }

    async fn find_by_id(
        &self,
        token_id: TokenId,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        Ok(self.records.get(&token_id).map(|r| r.value().clone()))
    }

    async fn revoke_if_not_revoked(
        &self,
        token_id: TokenId,
        revoked_at: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        // The shard write lock makes check-and-set a single step.
        match self.records.get_mut(&token_id) {
            Some(mut record) if !record.revoked => {
                record.revoked = true;
                record.revoked_at = Some(revoked_at);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn revoke_all_for_user(
        &self,
        user_id: UserId,
        revoked_at: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        let mut revoked = 0;
        for mut record in self.records.iter_mut() {
            if record.user_id == user_id && !record.revoked {
                record.revoked = true;
                record.revoked_at = Some(revoked_at);
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}
