use anyhow::Result;
use std::env;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub refresh_secret: String,
    pub access_token_expiry: u64,  // 15 minutes
    pub refresh_token_expiry: u64, // 7 days
}

impl JwtConfig {
    pub fn from_env() -> Result<Self> {
        let secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable must be set"))?;
        let refresh_secret = env::var("JWT_REFRESH_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_REFRESH_SECRET environment variable must be set"))?;

        let access_token_expiry = env::var("JWT_ACCESS_EXPIRATION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(900); // 15 minutes

        let refresh_token_expiry = env::var("JWT_REFRESH_EXPIRATION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(604800); // 7 days

        Self::new(secret, refresh_secret, access_token_expiry, refresh_token_expiry)
    }

    pub fn new(
        secret: String,
        refresh_secret: String,
        access_token_expiry: u64,
        refresh_token_expiry: u64,
    ) -> Result<Self> {
        if secret.len() < MIN_SECRET_LEN || refresh_secret.len() < MIN_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "JWT_SECRET and JWT_REFRESH_SECRET must be at least {} characters",
                MIN_SECRET_LEN
            ));
        }
        if secret == refresh_secret {
            return Err(anyhow::anyhow!(
                "JWT_SECRET and JWT_REFRESH_SECRET must be different"
            ));
        }
        if access_token_expiry == 0 || refresh_token_expiry == 0 {
            return Err(anyhow::anyhow!("JWT expirations must be greater than zero"));
        }

        Ok(Self {
            secret,
            refresh_secret,
            access_token_expiry,
            refresh_token_expiry,
        })
    }
}
