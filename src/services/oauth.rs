use crate::config::oauth::{OAuthConfig, OAuthProvider, OAuthProviderConfig};
use crate::error::{AppError, AppResult};
use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

/// Identity returned by a provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacebookUserInfo {
    id: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<FacebookPicture>,
}

#[derive(Debug, Deserialize)]
struct FacebookPicture {
    data: FacebookPictureData,
}

#[derive(Debug, Deserialize)]
struct FacebookPictureData {
    url: String,
}

#[derive(Clone)]
pub struct OAuthService {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl OAuthService {
    pub fn new(config: OAuthConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build OAuth HTTP client")?;
        Ok(Self { config, http })
    }

    fn provider(&self, provider: OAuthProvider) -> AppResult<&OAuthProviderConfig> {
        self.config.provider(provider).ok_or(AppError::NotFound)
    }

    pub fn is_enabled(&self, provider: OAuthProvider) -> bool {
        self.config.provider(provider).is_some()
    }

    pub fn authorization_url(&self, provider: OAuthProvider, state: &str) -> AppResult<String> {
        let cfg = self.provider(provider)?;
        let url = reqwest::Url::parse_with_params(
            &cfg.authorize_url,
            &[
                ("client_id", cfg.client_id.as_str()),
                ("redirect_uri", cfg.callback_url.as_str()),
                ("response_type", "code"),
                ("scope", cfg.scope.as_str()),
                ("state", state),
            ],
        )
        .context("Invalid OAuth authorization URL")?;
        Ok(url.to_string())
    }

    /// Exchanges an authorization code and loads the user's profile.
    pub async fn fetch_profile(
        &self,
        provider: OAuthProvider,
        code: &str,
    ) -> AppResult<OAuthProfile> {
        let cfg = self.provider(provider)?;

        let token_response = self
            .http
            .post(&cfg.token_url)
            .form(&[
                ("code", code),
                ("client_id", cfg.client_id.as_str()),
                ("client_secret", cfg.client_secret.as_str()),
                ("redirect_uri", cfg.callback_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .with_context(|| format!("{provider} token exchange failed"))?;

        if !token_response.status().is_success() {
            let status = token_response.status();
            let body = token_response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("{provider} token error ({status}): {body}").into());
        }

        let token: TokenResponse = token_response
            .json()
            .await
            .with_context(|| format!("invalid {provider} token response"))?;

        let userinfo = self
            .http
            .get(&cfg.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .with_context(|| format!("{provider} userinfo request failed"))?
            .error_for_status()
            .with_context(|| format!("{provider} userinfo request rejected"))?;

        let profile = match provider {
            OAuthProvider::Google => {
                let info: GoogleUserInfo = userinfo
                    .json()
                    .await
                    .context("invalid Google userinfo response")?;
                OAuthProfile {
                    id: info.sub,
                    email: info.email,
                    name: info.name,
                    picture: info.picture,
                }
            }
            OAuthProvider::Facebook => {
                let info: FacebookUserInfo = userinfo
                    .json()
                    .await
                    .context("invalid Facebook userinfo response")?;
                OAuthProfile {
                    id: info.id,
                    email: info.email,
                    name: info.name,
                    picture: info.picture.map(|p| p.data.url),
                }
            }
        };

        Ok(profile)
    }

    pub fn success_redirect(&self, access_token: &str, refresh_token: &str) -> AppResult<String> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/auth/success", self.config.frontend_url),
            &[("token", access_token), ("refreshToken", refresh_token)],
        )
        .context("Invalid FRONTEND_URL")?;
        Ok(url.to_string())
    }

    pub fn failure_redirect(&self) -> String {
        format!("{}/login?error=oauth_failed", self.config.frontend_url)
    }
}
