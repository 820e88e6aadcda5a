use crate::config::parse_bool_env;
use axum::http::{header, HeaderMap};
use std::env;

pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
pub const OAUTH_STATE_MAX_AGE_SECS: u64 = 600;

#[derive(Debug, Clone)]
pub struct CookieConfig {
    secure: bool,
    same_site: &'static str,
}

impl CookieConfig {
    pub fn from_env() -> Self {
        let same_site = parse_same_site(
            &env::var("AUTH_COOKIE_SAMESITE").unwrap_or_else(|_| "Lax".to_string()),
        );
        let mut secure = parse_bool_env("AUTH_COOKIE_SECURE", false);

        // Browsers require SameSite=None cookies to also be Secure.
        if same_site == "None" {
            secure = true;
        }

        Self { secure, same_site }
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            secure: false,
            same_site: "Lax",
        }
    }
}

fn parse_same_site(value: &str) -> &'static str {
    match value.trim().to_ascii_lowercase().as_str() {
        "strict" => "Strict",
        "none" => "None",
        _ => "Lax",
    }
}

pub fn build_cookie(config: &CookieConfig, name: &str, value: &str, max_age_seconds: u64) -> String {
    let mut cookie = format!(
        "{name}={value}; Path=/; Max-Age={max_age_seconds}; HttpOnly; SameSite={}",
        config.same_site
    );
    if config.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn build_clear_cookie(config: &CookieConfig, name: &str) -> String {
    build_cookie(config, name, "", 0)
}

pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookie_header| {
            cookie_header.split(';').find_map(|cookie| {
                let (key, value) = cookie.trim().split_once('=')?;
                (key.trim() == name).then(|| value.trim().to_string())
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; oauth_state=abc123"),
        );
        assert_eq!(
            extract_cookie(&headers, OAUTH_STATE_COOKIE).as_deref(),
            Some("abc123")
        );
        assert_eq!(extract_cookie(&headers, "missing"), None);
    }

    #[test]
    fn same_site_none_forces_secure() {
        assert_eq!(parse_same_site("none"), "None");
        let cookie = build_cookie(
            &CookieConfig {
                secure: true,
                same_site: "None",
            },
            OAUTH_STATE_COOKIE,
            "v",
            600,
        );
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("HttpOnly"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = build_clear_cookie(&CookieConfig::default(), OAUTH_STATE_COOKIE);
        assert!(cookie.starts_with("oauth_state=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
