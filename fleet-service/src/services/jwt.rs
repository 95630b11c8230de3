use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use std::fs;
use uuid::Uuid;

use crate::config::JwtConfig;

/// Signs login tokens and verifies bearer tokens. Claims are kept as an open
/// map since user and edge tokens carry different claim sets.
#[derive(Clone)]
pub struct JwtService {
    algorithm: Algorithm,
    encoding_key: Option<EncodingKey>,
    decoding_key: DecodingKey,
    token_expiry_minutes: i64,
}

impl JwtService {
    /// RS256 when a public key is configured, otherwise HS256 with the shared secret.
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        if let Some(public_key_path) = &config.public_key_path {
            let public_key_pem = fs::read_to_string(public_key_path).map_err(|e| {
                anyhow::anyhow!("Failed to read public key from {}: {}", public_key_path, e)
            })?;
            let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
                .map_err(|e| anyhow::anyhow!("Failed to parse public key: {}", e))?;

            let encoding_key = match &config.private_key_path {
                Some(path) => {
                    let pem = fs::read_to_string(path).map_err(|e| {
                        anyhow::anyhow!("Failed to read private key from {}: {}", path, e)
                    })?;
                    Some(
                        EncodingKey::from_rsa_pem(pem.as_bytes())
                            .map_err(|e| anyhow::anyhow!("Failed to parse private key: {}", e))?,
                    )
                }
                None => None,
            };

            tracing::info!(signing = encoding_key.is_some(), "JWT service initialized with RS256 keys");
            return Ok(Self {
                algorithm: Algorithm::RS256,
                encoding_key,
                decoding_key,
                token_expiry_minutes: config.token_expiry_minutes,
            });
        }

        let secret = config
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET or JWT_PUBLIC_KEY_PATH must be set"))?;
        tracing::info!("JWT service initialized with HS256 secret");
        Ok(Self::from_secret(secret, config.token_expiry_minutes))
    }

    pub fn from_secret(secret: &str, token_expiry_minutes: i64) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            encoding_key: Some(EncodingKey::from_secret(secret.as_bytes())),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_expiry_minutes,
        }
    }

    /// Signs `claims`, adding `iat`, `exp` and `jti`.
    pub fn issue(&self, mut claims: Map<String, Value>) -> Result<String, anyhow::Error> {
        let encoding_key = self
            .encoding_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No signing key configured"))?;
        let now = Utc::now();
        let exp = now + Duration::minutes(self.token_expiry_minutes);
        claims.insert("iat".into(), Value::from(now.timestamp()));
        claims.insert("exp".into(), Value::from(exp.timestamp()));
        claims.insert("jti".into(), Value::from(Uuid::new_v4().to_string()));

        encode(&Header::new(self.algorithm), &claims, encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode token: {}", e))
    }

    /// Verifies signature and expiry and returns the claims.
    pub fn verify(&self, token: &str) -> Result<Map<String, Value>, jsonwebtoken::errors::Error> {
        let validation = Validation::new(self.algorithm);
        Ok(decode::<Map<String, Value>>(token, &self.decoding_key, &validation)?.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn issued_token_verifies() {
        let service = JwtService::from_secret("test-secret", 5);
        let claims = json!({"tenantId": "t1", "email": "a@b.c"})
            .as_object()
            .cloned()
            .unwrap();
        let token = service.issue(claims).unwrap();
        let verified = service.verify(&token).unwrap();
        assert_eq!(verified["tenantId"], "t1");
        assert!(verified.contains_key("exp"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = JwtService::from_secret("a", 5).issue(Map::new()).unwrap();
        assert!(JwtService::from_secret("b", 5).verify(&token).is_err());
    }
}
