use super::{frontend_url, parse_bool_env, parse_env_or};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Consecutive wrong passwords before the account is locked.
    pub max_login_attempts: u32,
    pub lock_duration: chrono::Duration,
    pub password_reset_ttl: chrono::Duration,
    pub email_verification_ttl: chrono::Duration,
    pub send_verification_email: bool,
    /// Upper bound for a single outbound email, SMTP handshake included.
    pub email_timeout: Duration,
    pub frontend_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_login_attempts: 5,
            lock_duration: chrono::Duration::minutes(15),
            password_reset_ttl: chrono::Duration::hours(1),
            email_verification_ttl: chrono::Duration::hours(24),
            send_verification_email: false,
            email_timeout: Duration::from_secs(10),
            frontend_url: "http://localhost:8080".to_string(),
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_login_attempts = parse_env_or("MAX_LOGIN_ATTEMPTS", defaults.max_login_attempts);
        let lock_minutes: i64 = parse_env_or("LOCK_DURATION_MINUTES", 15);
        let reset_minutes: i64 = parse_env_or("PASSWORD_RESET_TTL_MINUTES", 60);
        let email_timeout_secs: u64 = parse_env_or("EMAIL_TIMEOUT_SECS", 10);

        Self {
            max_login_attempts: max_login_attempts.max(1),
            lock_duration: chrono::Duration::minutes(lock_minutes.max(1)),
            password_reset_ttl: chrono::Duration::minutes(reset_minutes.max(1)),
            email_verification_ttl: defaults.email_verification_ttl,
            send_verification_email: parse_bool_env("SEND_VERIFICATION_EMAIL", false),
            email_timeout: Duration::from_secs(email_timeout_secs.max(1)),
            frontend_url: frontend_url(),
        }
    }
}
