use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[async_trait::async_trait]
pub trait RefreshTokenRepo: Send + Sync {
    /// Insert a record with `revoked = false`.
    async fn create(&self, token: &NewRefreshToken) -> Result<(), AuthError>;

    async fn find_by_id(&self, token_id: TokenId)
    -> Result<Option<RefreshTokenRecord>, AuthError>;

    /// Flip `revoked` to true only if it is still false. Returns affected rows,
    /// so `0` means another caller got there first.
    async fn revoke_if_not_revoked(
        &self,
        token_id: TokenId,
        revoked_at: DateTime<Utc>,
    ) -> Result<u64, AuthError>;

    async fn revoke_all_for_user(
        &self,
        user_id: UserId,
        revoked_at: DateTime<Utc>,
    ) -> Result<u64, AuthError>;
}
