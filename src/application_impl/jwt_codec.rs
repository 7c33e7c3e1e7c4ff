use crate::application_port::{IssuedToken, TokenClaims, TokenCodec, TokenError};
use crate::domain_model::TokenId;
use crate::domain_port::Clock;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// HMAC-SHA256 needs a key at least as long as its output.
pub const MIN_SIGNING_KEY_LEN: usize = 32;

const REGISTERED_CLAIMS: [&str; 5] = ["jti", "sub", "iss", "iat", "exp"];

#[derive(Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Number of random bytes behind each refresh token secret.
    pub refresh_secret_len: usize,
    pub signing_key: Vec<u8>,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("refresh_secret_len", &self.refresh_secret_len)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

pub struct JwtHs256Codec {
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl JwtHs256Codec {
    pub fn new(cfg: &JwtConfig, clock: Arc<dyn Clock>) -> Result<Self, TokenError> {
        if cfg.signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(TokenError::Signing(format!(
                "signing key must be at least {} bytes, got {}",
                MIN_SIGNING_KEY_LEN,
                cfg.signing_key.len()
            )));
        }

        // Expiry and issuer are checked by the callers against their own rules.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Ok(JwtHs256Codec {
            issuer: cfg.issuer.clone(),
            encoding_key: EncodingKey::from_secret(&cfg.signing_key),
            decoding_key: DecodingKey::from_secret(&cfg.signing_key),
            validation,
            clock,
        })
    }
}

impl TokenCodec for JwtHs256Codec {
    fn issuer(&self) -> &str {
        &self.issuer
    }

    fn issue(
        &self,
        subject: &str,
        ttl: Duration,
        mut extra: Map<String, Value>,
    ) -> Result<IssuedToken, TokenError> {
        extra.retain(|name, _| !REGISTERED_CLAIMS.contains(&name.as_str()));

        let ttl = chrono::Duration::from_std(ttl).map_err(|e| TokenError::Signing(e.to_string()))?;
        let issued_at = self.clock.now();
        let expires_at = issued_at + ttl;
        let token_id = TokenId::new_v4();

        let claims = TokenClaims {
            jti: token_id.to_string(),
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            extra,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            token,
            token_id,
            issued_at,
            expires_at,
        })
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::ManualClock;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::{TimeZone, Utc};
    use serde::Serialize;
    use serde_json::json;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn config(key: &[u8]) -> JwtConfig {
        JwtConfig {
            issuer: "tokenward.test".to_string(),
            access_ttl: Duration::from_secs(900),
            refresh_ttl: Duration::from_secs(86_400),
            refresh_secret_len: 32,
            signing_key: key.to_vec(),
        }
    }

    fn codec_at(key: &[u8], clock: Arc<ManualClock>) -> JwtHs256Codec {
        JwtHs256Codec::new(&config(key), clock).unwrap()
    }

    fn start() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn verify_returns_what_issue_signed() {
        let clock = start();
        let codec = codec_at(KEY, clock.clone());
        let mut extra = Map::new();
        extra.insert("username".to_string(), json!("alice"));

        let issued = codec
            .issue("user-1", Duration::from_secs(600), extra)
            .unwrap();
        let claims = codec.verify(&issued.token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.iss, "tokenward.test");
        assert_eq!(claims.token_id(), Some(issued.token_id));
        assert_eq!(claims.exp - claims.iat, 600);
        assert_eq!(claims.iat, clock.now().timestamp());
        assert_eq!(claims.claim::<String>("username").unwrap().as_deref(), Some("alice"));
        assert_eq!(issued.token.split('.').count(), 3);
    }

    #[test]
    fn every_issue_gets_a_fresh_token_id() {
        let codec = codec_at(KEY, start());
        let a = codec.issue("u", Duration::from_secs(60), Map::new()).unwrap();
        let b = codec.issue("u", Duration::from_secs(60), Map::new()).unwrap();
        assert_ne!(a.token_id, b.token_id);
    }

    #[test]
    fn extra_claims_cannot_override_registered_ones() {
        let codec = codec_at(KEY, start());
        let mut extra = Map::new();
        extra.insert("sub".to_string(), json!("someone-else"));
        extra.insert("iss".to_string(), json!("evil"));

        let issued = codec.issue("user-1", Duration::from_secs(60), extra).unwrap();
        let claims = codec.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.iss, "tokenward.test");
        assert!(claims.extra.is_empty());
    }

    #[test]
    fn verify_does_not_check_expiry() {
        let clock = start();
        let codec = codec_at(KEY, clock.clone());
        let issued = codec.issue("u", Duration::from_secs(1), Map::new()).unwrap();
        clock.advance(Duration::from_secs(3600));

        let claims = codec.verify(&issued.token).unwrap();
        assert!(claims.is_expired_at(clock.now()));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let codec = codec_at(KEY, start());
        let issued = codec.issue("user-1", Duration::from_secs(60), Map::new()).unwrap();

        let parts: Vec<&str> = issued.token.split('.').collect();
        let mut payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        payload["sub"] = json!("user-2");
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert!(matches!(codec.verify(&forged), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn token_signed_with_another_key_is_rejected() {
        let other = codec_at(b"ffffffffffffffffffffffffffffffff", start());
        let codec = codec_at(KEY, start());
        let issued = other.issue("user-1", Duration::from_secs(60), Map::new()).unwrap();

        assert!(codec.verify(&issued.token).is_err());
    }

    #[test]
    fn other_algorithms_are_rejected() {
        let codec = codec_at(KEY, start());
        let claims = json!({
            "jti": uuid::Uuid::new_v4().to_string(),
            "sub": "user-1",
            "iss": "tokenward.test",
            "iat": 0,
            "exp": i64::MAX / 2,
        });
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(KEY),
        )
        .unwrap();

        assert!(codec.verify(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let codec = codec_at(KEY, start());
        for token in ["", "abc", "a.b.c", "not.a.valid.jwt.format"] {
            assert!(codec.verify(token).is_err(), "{token:?} verified");
        }
    }

    #[test]
    fn wrong_typed_registered_claim_is_rejected() {
        #[derive(Serialize)]
        struct Odd {
            jti: String,
            sub: u64,
            iss: String,
            iat: i64,
            exp: i64,
        }
        let codec = codec_at(KEY, start());
        let token = encode(
            &Header::new(Algorithm::HS256),
            &Odd {
                jti: "x".to_string(),
                sub: 42,
                iss: "tokenward.test".to_string(),
                iat: 0,
                exp: 10,
            },
            &EncodingKey::from_secret(KEY),
        )
        .unwrap();

        assert!(matches!(codec.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn wrong_typed_custom_claim_fails_closed() {
        let codec = codec_at(KEY, start());
        let mut extra = Map::new();
        extra.insert("roles".to_string(), json!("ADMIN"));
        extra.insert("token".to_string(), json!(12345));
        let issued = codec.issue("u", Duration::from_secs(60), extra).unwrap();
        let claims = codec.verify(&issued.token).unwrap();

        assert!(matches!(
            claims.claim::<Vec<String>>("roles"),
            Err(TokenError::ClaimType { .. })
        ));
        assert!(matches!(
            claims.claim::<String>("token"),
            Err(TokenError::ClaimType { .. })
        ));
        assert!(claims.claim::<String>("missing").unwrap().is_none());
    }

    #[test]
    fn short_signing_key_is_refused() {
        let result = JwtHs256Codec::new(&config(b"too-short"), start());
        assert!(matches!(result, Err(TokenError::Signing(_))));
    }

    #[test]
    fn debug_output_hides_the_signing_key() {
        let shown = format!("{:?}", config(KEY));
        assert!(!shown.contains("0123456789abcdef"));
    }
}
