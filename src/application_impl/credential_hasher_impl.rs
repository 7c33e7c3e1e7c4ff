use crate::application_port::{AuthError, CredentialHasher};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};

/// Argon2id hasher used for passwords and for refresh token secrets.
#[derive(Clone, Default)]
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
}

impl Argon2PasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Memory cost is in KiB.
    pub fn with_cost(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, AuthError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| AuthError::InternalError(format!("argon2 params: {}", e)))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

#[async_trait::async_trait]
impl CredentialHasher for Argon2PasswordHasher {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::InternalError(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(password_hash)
            .map_err(|e| AuthError::InternalError(format!("invalid PHC hash: {}", e)))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::InternalError(format!("verify error: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> Argon2PasswordHasher {
        Argon2PasswordHasher::with_cost(64, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn hash_then_verify() {
        let hasher = hasher();
        let hash = hasher.hash_password("P@ssw0rd1").await.unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("P@ssw0rd1"));
        assert!(hasher.verify_password("P@ssw0rd1", &hash).await.unwrap());
        assert!(!hasher.verify_password("wrong", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn salts_differ_between_hashes() {
        let hasher = hasher();
        let a = hasher.hash_password("same").await.unwrap();
        let b = hasher.hash_password("same").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn malformed_hash_is_an_internal_error() {
        let result = hasher().verify_password("x", "not-a-phc-string").await;
        assert!(matches!(result, Err(AuthError::InternalError(_))));
    }

    #[test]
    fn invalid_cost_is_rejected() {
        assert!(Argon2PasswordHasher::with_cost(1, 0, 1).is_err());
    }
}
