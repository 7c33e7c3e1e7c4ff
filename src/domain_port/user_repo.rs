use crate::application_port::*;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert a user. Unique username/email violations map to the matching
    /// `AuthError::*AlreadyExists` variant.
    async fn create(&self, user: &NewUser) -> Result<UserRecord, AuthError>;

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError>;

    async fn username_exists(&self, username: &str) -> Result<bool, AuthError>;

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError>;

    async fn count(&self) -> Result<u64, AuthError>;
}
