use crate::application_impl::JwtConfig;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Claim carrying the refresh token secret.
pub const SECRET_CLAIM: &str = "token";

const INVALID_OR_EXPIRED: &str = "Invalid or expired refresh token";
const INVALID_REFRESH: &str = "Invalid refresh token";
const ALREADY_REVOKED: &str = "Refresh token already revoked";

#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub refresh_secret_len: usize,
}

impl From<&JwtConfig> for TokenLifetimes {
    fn from(cfg: &JwtConfig) -> Self {
        TokenLifetimes {
            access_ttl: cfg.access_ttl,
            refresh_ttl: cfg.refresh_ttl,
            refresh_secret_len: cfg.refresh_secret_len,
        }
    }
}

pub struct RealTokenService {
    codec: Arc<dyn TokenCodec>,
    version_cache: Arc<dyn TokenVersionCache>,
    refresh_repo: Arc<dyn RefreshTokenRepo>,
    user_repo: Arc<dyn UserRepo>,
    secret_hasher: Arc<dyn CredentialHasher>,
    clock: Arc<dyn Clock>,
    lifetimes: TokenLifetimes,
}

impl RealTokenService {
    pub fn new(
        codec: Arc<dyn TokenCodec>,
        version_cache: Arc<dyn TokenVersionCache>,
        refresh_repo: Arc<dyn RefreshTokenRepo>,
        user_repo: Arc<dyn UserRepo>,
        secret_hasher: Arc<dyn CredentialHasher>,
        clock: Arc<dyn Clock>,
        lifetimes: TokenLifetimes,
    ) -> Self {
        Self {
            codec,
            version_cache,
            refresh_repo,
            user_repo,
            secret_hasher,
            clock,
            lifetimes,
        }
    }

    fn generate_secret(&self) -> String {
        let mut bytes = vec![0u8; self.lifetimes.refresh_secret_len];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    async fn issue_refresh_token(&self, user: &UserRecord) -> Result<String, AuthError> {
        let secret = self.generate_secret();
        let mut extra = Map::new();
        extra.insert(SECRET_CLAIM.to_string(), Value::String(secret.clone()));

        let issued = self
            .codec
            .issue(&user.user_id.to_string(), self.lifetimes.refresh_ttl, extra)?;

        let secret_hash = self.secret_hasher.hash_password(&secret).await?;
        self.refresh_repo
            .create(&NewRefreshToken {
                token_id: issued.token_id,
                user_id: user.user_id,
                secret_hash,
                expires_at: issued.expires_at,
            })
            .await?;

        Ok(issued.token)
    }

    async fn issue_access_token(&self, user: &UserRecord) -> Result<String, AuthError> {
        let mut extra = Map::new();
        extra.insert("username".to_string(), json!(user.username));
        extra.insert("email".to_string(), json!(user.email));
        extra.insert("roles".to_string(), json!(user.roles.names()));

        let issued = self
            .codec
            .issue(&user.user_id.to_string(), self.lifetimes.access_ttl, extra)?;

        self.version_cache
            .set_current_version(user.user_id, issued.token_id, self.lifetimes.access_ttl)
            .await?;

        Ok(issued.token)
    }

    /// Signature, issuer and claimed expiry of a refresh token.
    fn verify_refresh_claims(
        &self,
        token: &str,
    ) -> Result<(TokenClaims, TokenId, UserId), AuthError> {
        let claims = self.codec.verify(token).map_err(|e| {
            debug!(error = %e, "refresh token failed verification");
            AuthError::unauthorized(INVALID_OR_EXPIRED)
        })?;

        if claims.iss != self.codec.issuer() || claims.is_expired_at(self.clock.now()) {
            return Err(AuthError::unauthorized(INVALID_OR_EXPIRED));
        }

        let token_id = claims
            .token_id()
            .ok_or_else(|| AuthError::unauthorized("Invalid token ID"))?;
        let subject = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| AuthError::unauthorized("Invalid token subject"))?;

        Ok((claims, token_id, subject))
    }

    async fn rotate(
        &self,
        claims: TokenClaims,
        token_id: TokenId,
        user: &UserRecord,
    ) -> Result<TokenPair, AuthError> {
        let record = self
            .refresh_repo
            .find_by_id(token_id)
            .await?
            .ok_or_else(|| AuthError::unauthorized("Token not found"))?;

        let secret = claims
            .claim::<String>(SECRET_CLAIM)
            .ok()
            .flatten()
            .ok_or_else(|| AuthError::unauthorized(INVALID_REFRESH))?;

        if record.user_id != user.user_id {
            warn!(%token_id, "refresh token presented for a different user");
            return Err(AuthError::unauthorized(INVALID_REFRESH));
        }

        if !self
            .secret_hasher
            .verify_password(&secret, &record.secret_hash)
            .await?
        {
            return Err(AuthError::unauthorized(INVALID_REFRESH));
        }

        let now = self.clock.now();
        if record.expires_at <= now {
            return Err(AuthError::unauthorized("Refresh token expired"));
        }
        if record.revoked {
            return Err(AuthError::unauthorized(ALREADY_REVOKED));
        }

        if self.refresh_repo.revoke_if_not_revoked(token_id, now).await? == 0 {
            warn!(%token_id, "refresh token was rotated concurrently");
            return Err(AuthError::unauthorized(ALREADY_REVOKED));
        }

        info!(user_id = %user.user_id, %token_id, "refresh token rotated");
        self.issue_token_pair(user).await
    }

    /// Claims of a currently valid access token, `None` when it is not.
    async fn valid_access_claims(&self, token: &str) -> Result<Option<TokenClaims>, AuthError> {
        let Ok(claims) = self.codec.verify(token) else {
            return Ok(None);
        };
        if claims.is_expired_at(self.clock.now()) || claims.iss != self.codec.issuer() {
            return Ok(None);
        }
        let (Ok(subject), Some(token_id)) = (claims.sub.parse::<UserId>(), claims.token_id())
        else {
            return Ok(None);
        };

        if self
            .version_cache
            .is_current_version(subject, token_id)
            .await?
        {
            Ok(Some(claims))
        } else {
            Ok(None)
        }
    }
}

#[async_trait::async_trait]
impl TokenService for RealTokenService {
    async fn issue_token_pair(&self, user: &UserRecord) -> Result<TokenPair, AuthError> {
        let refresh_token = self.issue_refresh_token(user).await?;
        let access_token = self.issue_access_token(user).await?;

        debug!(user_id = %user.user_id, "token pair issued");
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let (claims, token_id, subject) = self.verify_refresh_claims(refresh_token.trim())?;

        let user = self
            .user_repo
            .find_by_id(subject)
            .await?
            .ok_or_else(|| AuthError::unauthorized(INVALID_REFRESH))?;

        self.rotate(claims, token_id, &user).await
    }

    async fn refresh_for_user(
        &self,
        refresh_token: &str,
        user: &UserRecord,
    ) -> Result<TokenPair, AuthError> {
        let (claims, token_id, subject) = self.verify_refresh_claims(refresh_token.trim())?;
        if subject != user.user_id {
            return Err(AuthError::unauthorized(INVALID_REFRESH));
        }
        self.rotate(claims, token_id, user).await
    }

    async fn is_access_token_valid(&self, token: &str) -> Result<bool, AuthError> {
        Ok(self.valid_access_claims(token).await?.is_some())
    }

    async fn authenticate_access_token(
        &self,
        token: &str,
    ) -> Result<AuthenticatedUser, AuthError> {
        let claims = self
            .valid_access_claims(token)
            .await?
            .ok_or_else(|| AuthError::unauthorized("Invalid access token"))?;

        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| AuthError::unauthorized("Invalid token subject"))?;
        let username: String = claims
            .claim("username")?
            .ok_or_else(|| AuthError::unauthorized("Invalid token"))?;
        let email: String = claims
            .claim("email")?
            .ok_or_else(|| AuthError::unauthorized("Invalid token"))?;
        let roles: Vec<String> = claims
            .claim("roles")?
            .ok_or_else(|| AuthError::unauthorized("Invalid token"))?;

        Ok(AuthenticatedUser {
            user_id,
            username,
            email,
            roles,
        })
    }

    fn extract_claims(&self, token: &str) -> Result<TokenClaims, AuthError> {
        Ok(self.codec.verify(token)?)
    }

    fn extract_subject(&self, token: &str) -> Result<UserId, AuthError> {
        self.codec
            .verify(token.trim())
            .ok()
            .and_then(|claims| claims.sub.parse::<UserId>().ok())
            .ok_or_else(|| AuthError::unauthorized("Invalid token subject"))
    }

    async fn invalidate_access_tokens(&self, user_id: UserId) -> Result<(), AuthError> {
        self.version_cache.invalidate(user_id).await
    }

    async fn revoke_all_tokens(&self, user_id: UserId) -> Result<(), AuthError> {
        let mut failures = Vec::new();

        if let Err(e) = self.version_cache.invalidate(user_id).await {
            error!(%user_id, error = %e, "failed to invalidate access token version");
            failures.push(format!("access token version: {}", e));
        }

        match self
            .refresh_repo
            .revoke_all_for_user(user_id, self.clock.now())
            .await
        {
            Ok(revoked) => info!(%user_id, revoked, "refresh tokens revoked"),
            Err(e) => {
                error!(%user_id, error = %e, "failed to revoke refresh tokens");
                failures.push(format!("refresh tokens: {}", e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AuthError::Store(format!(
                "partial revocation for user {}: {}",
                user_id,
                failures.join("; ")
            )))
        }
    }
}
