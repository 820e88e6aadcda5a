pub mod auth;
pub mod database;
pub mod email;
pub mod jwt;
pub mod oauth;
pub mod rate_limit;

use std::env;
use std::str::FromStr;

/// Parse a boolean flag such as `RATE_LIMIT_ENABLED`, falling back to
/// `default` when the variable is unset or unrecognised.
pub fn parse_bool_env(var_name: &str, default: bool) -> bool {
    env::var(var_name)
        .ok()
        .and_then(|value| parse_bool(&value))
        .unwrap_or(default)
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

pub(crate) fn parse_env_or<T: FromStr>(var_name: &str, default: T) -> T {
    env::var(var_name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

pub(crate) fn frontend_url() -> String {
    env::var("FRONTEND_URL")
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|_| "http://localhost:8080".to_string())
}
