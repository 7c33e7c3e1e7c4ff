use crate::application_port::{AuthError, TokenClaims};
use crate::domain_model::{AuthenticatedUser, TokenPair, UserId, UserRecord};
use serde::de::DeserializeOwned;

#[async_trait::async_trait]
pub trait TokenService: Send + Sync {
    async fn issue_token_pair(&self, user: &UserRecord) -> Result<TokenPair, AuthError>;

    /// Rotates a refresh token, loading its owner by the token subject.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;

    /// Rotates a refresh token owned by an already loaded user.
    async fn refresh_for_user(
        &self,
        refresh_token: &str,
        user: &UserRecord,
    ) -> Result<TokenPair, AuthError>;

    /// Token problems give `Ok(false)`; only an unreachable cache is an error.
    async fn is_access_token_valid(&self, token: &str) -> Result<bool, AuthError>;

    async fn authenticate_access_token(&self, token: &str)
    -> Result<AuthenticatedUser, AuthError>;

    fn extract_claims(&self, token: &str) -> Result<TokenClaims, AuthError>;

    fn extract_subject(&self, token: &str) -> Result<UserId, AuthError>;

    async fn invalidate_access_tokens(&self, user_id: UserId) -> Result<(), AuthError>;

    async fn revoke_all_tokens(&self, user_id: UserId) -> Result<(), AuthError>;
}

impl<'a> dyn TokenService + 'a {
    pub fn extract_claim<T: DeserializeOwned>(
        &self,
        token: &str,
        name: &str,
    ) -> Result<Option<T>, AuthError> {
        Ok(self.extract_claims(token)?.claim(name)?)
    }
}
