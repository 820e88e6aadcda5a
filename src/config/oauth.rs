use std::env;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthProvider {
    Google,
    Facebook,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Facebook => "facebook",
        }
    }

    /// Stored in `password_hash` for accounts created through this provider.
    /// Never a valid bcrypt hash, so local password login cannot succeed.
    pub fn password_placeholder(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "OAUTH_GOOGLE",
            OAuthProvider::Facebook => "OAUTH_FACEBOOK",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(OAuthProvider::Google),
            "facebook" => Ok(OAuthProvider::Facebook),
            _ => Err(format!("unknown OAuth provider: {s}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scope: String,
}

#[derive(Debug, Clone, Default)]
pub struct OAuthConfig {
    pub google: Option<OAuthProviderConfig>,
    pub facebook: Option<OAuthProviderConfig>,
    pub frontend_url: String,
}

impl OAuthConfig {
    /// A provider is enabled only when both its client id and secret are set.
    pub fn from_env() -> Self {
        let google = provider_from_env(
            "GOOGLE_CLIENT_ID",
            "GOOGLE_CLIENT_SECRET",
            "GOOGLE_CALLBACK_URL",
            "http://localhost:3000/auth/google/callback",
        )
        .map(|(client_id, client_secret, callback_url)| OAuthProviderConfig {
            client_id,
            client_secret,
            callback_url,
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v3/userinfo".to_string(),
            scope: "openid profile email".to_string(),
        });

        let facebook = provider_from_env(
            "FACEBOOK_APP_ID",
            "FACEBOOK_APP_SECRET",
            "FACEBOOK_CALLBACK_URL",
            "http://localhost:3000/auth/facebook/callback",
        )
        .map(|(client_id, client_secret, callback_url)| OAuthProviderConfig {
            client_id,
            client_secret,
            callback_url,
            authorize_url: "https://www.facebook.com/v19.0/dialog/oauth".to_string(),
            token_url: "https://graph.facebook.com/v19.0/oauth/access_token".to_string(),
            userinfo_url: "https://graph.facebook.com/me?fields=id,name,email,picture".to_string(),
            scope: "email".to_string(),
        });

        Self {
            google,
            facebook,
            frontend_url: super::frontend_url(),
        }
    }

    pub fn provider(&self, provider: OAuthProvider) -> Option<&OAuthProviderConfig> {
        match provider {
            OAuthProvider::Google => self.google.as_ref(),
            OAuthProvider::Facebook => self.facebook.as_ref(),
        }
    }
}

fn provider_from_env(
    id_var: &str,
    secret_var: &str,
    callback_var: &str,
    default_callback: &str,
) -> Option<(String, String, String)> {
    let client_id = env::var(id_var).ok().filter(|v| !v.trim().is_empty())?;
    let client_secret = env::var(secret_var).ok().filter(|v| !v.trim().is_empty())?;
    let callback_url = env::var(callback_var).unwrap_or_else(|_| default_callback.to_string());
    Some((client_id, client_secret, callback_url))
}
