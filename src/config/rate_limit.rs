use super::parse_bool_env;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Requests allowed per client IP per minute on the credential routes.
    pub requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.enabled = parse_bool_env("RATE_LIMIT_ENABLED", cfg.enabled);

        if let Ok(raw) = env::var("RATE_LIMIT_PER_MINUTE") {
            match parse_requests_per_minute(&raw) {
                Ok(limit) => cfg.requests_per_minute = limit,
                Err(err) => {
                    tracing::warn!("Invalid RATE_LIMIT_PER_MINUTE '{}': {}", raw, err);
                }
            }
        }

        cfg
    }

    /// Milliseconds needed to replenish one request slot.
    pub fn replenish_interval_ms(&self) -> u64 {
        (60_000 / u64::from(self.requests_per_minute.max(1))).max(1)
    }
}

fn parse_requests_per_minute(raw: &str) -> Result<u32, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty value".to_string());
    }
    let limit: u32 = trimmed
        .parse()
        .map_err(|_| format!("invalid number '{}'", trimmed))?;
    if limit == 0 {
        return Err("limit must be > 0".to_string());
    }
    Ok(limit)
}
