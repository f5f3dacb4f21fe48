use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SecurityConfig;

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: Option<String>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            user_id,
            email,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug)]
pub enum JwtError {
    TokenGeneration(String),
    InvalidToken(String),
    InvalidSecret,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::TokenGeneration(msg) => write!(f, "JWT generation error: {}", msg),
            JwtError::InvalidToken(msg) => write!(f, "Invalid JWT token: {}", msg),
            JwtError::InvalidSecret => write!(f, "JWT secret not configured"),
        }
    }
}

impl std::error::Error for JwtError {}

/// Mint a session token for `user_id`
pub fn generate_jwt(security: &SecurityConfig, user_id: Uuid, email: Option<String>) -> Result<String, JwtError> {
    if security.jwt_secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let claims = Claims::new(user_id, email, security.jwt_expiry_hours);
    let encoding_key = EncodingKey::from_secret(security.jwt_secret.as_bytes());

    encode(&Header::default(), &claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Validate signature and expiry, returning the claims
pub fn validate_jwt(security: &SecurityConfig, token: &str) -> Result<Claims, JwtError> {
    if security.jwt_secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(security.jwt_secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn tokens_round_trip_through_validation() {
        let security = AppConfig::development().security;
        let user = Uuid::new_v4();
        let token = generate_jwt(&security, user, Some("a@example.com".into())).unwrap();

        let claims = validate_jwt(&security, &token).unwrap();
        assert_eq!(claims.user_id, user);
        assert_eq!(claims.email.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let mut security = AppConfig::development().security;
        let token = generate_jwt(&security, Uuid::new_v4(), None).unwrap();
        security.jwt_secret = "rotated".into();
        assert!(matches!(validate_jwt(&security, &token), Err(JwtError::InvalidToken(_))));
    }

    #[test]
    fn empty_secret_is_a_configuration_error() {
        let mut security = AppConfig::development().security;
        security.jwt_secret.clear();
        assert!(matches!(generate_jwt(&security, Uuid::new_v4(), None), Err(JwtError::InvalidSecret)));
    }
}
