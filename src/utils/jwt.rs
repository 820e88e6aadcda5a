use crate::config::jwt::JwtConfig;
use crate::error::{AppError, AppResult};
use crate::models::UserModel;
use anyhow::Context;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub id: i32,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub token_type: TokenType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub id: i32,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub token_type: TokenType,
}

/// Signs and verifies access and refresh tokens. Each kind has its own secret.
#[derive(Clone)]
pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: i64,
    refresh_ttl: i64,
}

impl TokenIssuer {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_ttl: config.access_token_expiry as i64,
            refresh_ttl: config.refresh_token_expiry as i64,
        }
    }

    pub fn issue_access(&self, user: &UserModel) -> AppResult<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = AccessClaims {
            id: user.id,
            email: user.email.clone(),
            role: user.role.clone(),
            iat: now,
            exp: now + self.access_ttl,
            jti: uuid::Uuid::new_v4().to_string(),
            token_type: TokenType::Access,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding)
            .context("Failed to encode access token")?;
        Ok(token)
    }

    pub fn issue_refresh(&self, user: &UserModel) -> AppResult<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = RefreshClaims {
            id: user.id,
            iat: now,
            exp: now + self.refresh_ttl,
            jti: uuid::Uuid::new_v4().to_string(),
            token_type: TokenType::Refresh,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding)
            .context("Failed to encode refresh token")?;
        Ok(token)
    }

    /// Checks signature, expiry and token type. Never touches the store.
    pub fn verify_access(&self, token: &str) -> AppResult<AccessClaims> {
        let claims = decode::<AccessClaims>(token, &self.access_decoding, &validation())
            .map_err(|e| {
                tracing::debug!("Access token rejected: {}", e);
                AppError::InvalidToken
            })?
            .claims;

        if claims.token_type != TokenType::Access {
            return Err(AppError::InvalidToken);
        }
        Ok(claims)
    }

    pub fn verify_refresh(&self, token: &str) -> AppResult<RefreshClaims> {
        let claims = decode::<RefreshClaims>(token, &self.refresh_decoding, &validation())
            .map_err(|e| {
                tracing::debug!("Refresh token rejected: {}", e);
                AppError::InvalidToken
            })?
            .claims;

        if claims.token_type != TokenType::Refresh {
            return Err(AppError::InvalidToken);
        }
        Ok(claims)
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation
}
