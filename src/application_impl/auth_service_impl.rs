use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use tracing::{info, warn};

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_service: Arc<dyn TokenService>,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_service: Arc<dyn TokenService>,
    ) -> Self {
        Self {
            user_repo,
            credential_hasher,
            token_service,
        }
    }

    fn required(field: &str, value: &str) -> Result<String, AuthError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AuthError::InvalidInput(format!("{} is required", field)));
        }
        Ok(value.to_string())
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<UserRecord>, AuthError> {
        if login.contains('@') {
            self.user_repo.find_by_email(login).await
        } else {
            self.user_repo.find_by_username(login).await
        }
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, AuthError> {
        if self.user_repo.username_exists(&user.username).await? {
            return Err(AuthError::UsernameAlreadyExists);
        }
        if self.user_repo.email_exists(&user.email).await? {
            return Err(AuthError::EmailAlreadyExists);
        }
        self.user_repo.create(&user).await
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn register(&self, request: RegisterInput) -> Result<UserRecord, AuthError> {
        let username = Self::required("username", &request.username)?;
        let email = Self::required("email", &request.email)?;
        if request.password.is_empty() {
            return Err(AuthError::InvalidInput("password is required".to_string()));
        }

        let display_name = request
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&username)
            .to_string();

        let password_hash = self
            .credential_hasher
            .hash_password(&request.password)
            .await?;

        let user = self
            .create_user(NewUser {
                user_id: UserId::new_v4(),
                username,
                email,
                password_hash,
                display_name,
                roles: Roles::default(),
            })
            .await?;

        info!(user_id = %user.user_id, username = %user.username, "user registered");
        Ok(user)
    }

    async fn authenticate(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let login = request.login.trim();
        if login.is_empty() || request.password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let user = self
            .find_by_login(login)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let ok = self
            .credential_hasher
            .verify_password(&request.password, &user.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidCredentials);
        }

        // Other devices keep their refresh tokens; only the access version resets.
        self.token_service
            .invalidate_access_tokens(user.user_id)
            .await?;
        let tokens = self.token_service.issue_token_pair(&user).await?;

        info!(user_id = %user.user_id, "user authenticated");
        Ok(LoginResult {
            user: UserProfile::from(&user),
            tokens,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<LoginResult, AuthError> {
        let refresh_token = refresh_token.trim();
        let user_id = self.token_service.extract_subject(refresh_token)?;

        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::unauthorized("Invalid refresh token"))?;

        let tokens = self
            .token_service
            .refresh_for_user(refresh_token, &user)
            .await?;

        Ok(LoginResult {
            user: UserProfile::from(&user),
            tokens,
        })
    }

    async fn logout(&self, user_id: UserId) -> Result<(), AuthError> {
        self.token_service.revoke_all_tokens(user_id).await?;
        info!(%user_id, "user logged out");
        Ok(())
    }

    async fn verify_access_token(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        self.token_service.authenticate_access_token(token).await
    }

    async fn bootstrap_admin(
        &self,
        admin: AdminBootstrap,
    ) -> Result<Option<UserRecord>, AuthError> {
        if self.user_repo.count().await? > 0 {
            return Ok(None);
        }
        if admin.password.trim().is_empty() {
            warn!("skipping admin bootstrap because no password was provided");
            return Ok(None);
        }

        let password_hash = self.credential_hasher.hash_password(&admin.password).await?;
        let user = self
            .create_user(NewUser {
                user_id: UserId::new_v4(),
                username: Self::required("bootstrap username", &admin.username)?,
                email: Self::required("bootstrap email", &admin.email)?,
                password_hash,
                display_name: "Administrator".to_string(),
                roles: Roles::new([UserRole::Admin]),
            })
            .await?;

        warn!(
            username = %user.username,
            "bootstrap admin account created, change its password immediately"
        );
        Ok(Some(user))
    }
}
