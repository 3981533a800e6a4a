//! Access tokens issued by the identity provider.
//!
//! Tokens are HS256 JWTs whose `sub` is the user id. The server only
//! verifies them; `encode_access_token` exists for tooling and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    pub fn new(user_id: Uuid, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            email: None,
            role: None,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }
}

#[derive(Debug, Error)]
pub enum TokenClaimsError {
    #[error("token signing secret is not configured")]
    MissingSecret,
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Decode(#[from] jsonwebtoken::errors::Error),
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp", "sub"]);
    validation
}

pub fn encode_access_token(
    claims: &AccessClaims,
    secret: &str,
) -> Result<String, TokenClaimsError> {
    if secret.is_empty() {
        return Err(TokenClaimsError::MissingSecret);
    }
    let token = encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn decode_access_token(token: &str, secret: &str) -> Result<AccessClaims, TokenClaimsError> {
    if secret.is_empty() {
        return Err(TokenClaimsError::MissingSecret);
    }
    decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation(),
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        ErrorKind::ExpiredSignature => TokenClaimsError::Expired,
        _ => TokenClaimsError::Decode(err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn round_trip_keeps_identity() {
        let user_id = Uuid::new_v4();
        let claims = AccessClaims::new(user_id, Duration::hours(1))
            .with_email("sam@example.com")
            .with_role("admin");
        let token = encode_access_token(&claims, SECRET).unwrap();

        let decoded = decode_access_token(&token, SECRET).unwrap();
        assert_eq!(decoded.sub, user_id);
        assert_eq!(decoded.email.as_deref(), Some("sam@example.com"));
        assert!(decoded.has_role("admin"));
    }

    #[test]
    fn rejects_wrong_secret_and_garbage() {
        let claims = AccessClaims::new(Uuid::new_v4(), Duration::hours(1));
        let token = encode_access_token(&claims, SECRET).unwrap();
        assert!(matches!(
            decode_access_token(&token, "other-secret"),
            Err(TokenClaimsError::Decode(_))
        ));
        assert!(decode_access_token("not.a.token", SECRET).is_err());
        assert!(matches!(
            decode_access_token(&token, ""),
            Err(TokenClaimsError::MissingSecret)
        ));
    }

    #[test]
    fn rejects_expired_tokens() {
        let claims = AccessClaims::new(Uuid::new_v4(), Duration::minutes(-10));
        let token = encode_access_token(&claims, SECRET).unwrap();
        assert!(matches!(
            decode_access_token(&token, SECRET),
            Err(TokenClaimsError::Expired)
        ));
    }
}
