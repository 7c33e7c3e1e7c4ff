use crate::application_port::*;
use crate::domain_model::*;
use std::time::Duration;

/// Latest access token id per user. Overwriting or deleting the entry
/// invalidates every access token issued before it.
#[async_trait::async_trait]
pub trait TokenVersionCache: Send + Sync {
    async fn set_current_version(
        &self,
        user_id: UserId,
        token_id: TokenId,
        ttl: Duration,
    ) -> Result<(), AuthError>;

    /// `false` on a miss. An unreachable cache is an error, never a verdict.
    async fn is_current_version(
        &self,
        user_id: UserId,
        token_id: TokenId,
    ) -> Result<bool, AuthError>;

    async fn invalidate(&self, user_id: UserId) -> Result<(), AuthError>;
}
