use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::{
    domain::UserId,
    error::{ApiError, ErrorCode},
};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token_secret: String,
    pub token_ttl_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: i64,
    exp: i64,
    iat: i64,
    jti: String,
}

pub fn mint_access_token(
    cfg: &AuthConfig,
    user_id: UserId,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::seconds(cfg.token_ttl_seconds);
    let claims = Claims {
        sub: user_id.0,
        iat: now.timestamp(),
        exp: exp.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.token_secret.as_bytes()),
    )
}

pub fn verify_access_token(cfg: &AuthConfig, token: &str) -> Result<UserId, ApiError> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.token_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::new(ErrorCode::Unauthorized, "invalid or expired access token"))?;
    Ok(UserId(decoded.claims.sub))
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
