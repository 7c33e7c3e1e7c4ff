use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::domain_model::TokenId;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("claim `{name}` has an unexpected type")]
    ClaimType { name: String },
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Registered claims plus whatever the issuer stamped next to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub jti: String,
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenClaims {
    /// Reads a custom claim. Absent claims are `None`, present claims of
    /// another type are an error.
    pub fn claim<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, TokenError> {
        match self.extra.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|_| TokenError::ClaimType {
                    name: name.to_string(),
                }),
        }
    }

    pub fn token_id(&self) -> Option<TokenId> {
        self.jti.parse().ok()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    /// Strict: a token whose expiry equals `now` is already expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: TokenId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub trait TokenCodec: Send + Sync {
    fn issuer(&self) -> &str;

    fn issue(
        &self,
        subject: &str,
        ttl: Duration,
        extra: Map<String, Value>,
    ) -> Result<IssuedToken, TokenError>;

    /// Checks structure and signature only; expiry and issuer are left to
    /// the caller.
    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError>;
}
