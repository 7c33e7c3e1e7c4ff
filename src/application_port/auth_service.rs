use crate::application_port::TokenError;
use crate::domain_model::{AuthenticatedUser, Roles, TokenPair, UserId, UserRecord};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("username already exists")]
    UsernameAlreadyExists,
    #[error("email already exists")]
    EmailAlreadyExists,
    #[error("user not found")]
    UserNotFound,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        AuthError::Unauthorized(reason.into())
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid(_) | TokenError::ClaimType { .. } => {
                AuthError::unauthorized("Invalid token")
            }
            TokenError::Signing(e) => AuthError::InternalError(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    /// Username, or email when it contains `@`.
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub roles: Roles,
}

impl From<&UserRecord> for UserProfile {
    fn from(user: &UserRecord) -> Self {
        UserProfile {
            user_id: user.user_id,
            username: user.username.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            roles: user.roles.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, request: RegisterInput) -> Result<UserRecord, AuthError>;
    async fn authenticate(&self, request: LoginInput) -> Result<LoginResult, AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<LoginResult, AuthError>;
    async fn logout(&self, user_id: UserId) -> Result<(), AuthError>;
    async fn verify_access_token(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
    /// Creates the first administrator when no user exists yet.
    async fn bootstrap_admin(
        &self,
        admin: AdminBootstrap,
    ) -> Result<Option<UserRecord>, AuthError>;
}
