use crate::config::oauth::OAuthProvider;
use crate::error::{AppError, AppResult};
use crate::services::{auth::AuthService, oauth::OAuthService};
use crate::utils::cookie::{
    build_clear_cookie, build_cookie, extract_cookie, CookieConfig, OAUTH_STATE_COOKIE,
    OAUTH_STATE_MAX_AGE_SECS,
};
use crate::utils::token::generate_token;
use axum::{
    extract::{Path, Query},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect},
    Extension,
};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user denies consent
    pub error: Option<String>,
}

fn enabled_provider(oauth: &OAuthService, provider: &str) -> AppResult<OAuthProvider> {
    let provider: OAuthProvider = provider.parse().map_err(|_| AppError::NotFound)?;
    if !oauth.is_enabled(provider) {
        return Err(AppError::NotFound);
    }
    Ok(provider)
}

#[utoipa::path(
    get,
    path = "/auth/{provider}",
    params(("provider" = String, Path, description = "google or facebook")),
    responses(
        (status = 303, description = "Redirect to the provider's consent page"),
        (status = 404, description = "Provider unknown or not configured", body = AppError),
    ),
    tag = "oauth"
)]
pub async fn oauth_start(
    Extension(oauth): Extension<OAuthService>,
    Extension(cookies): Extension<CookieConfig>,
    Path(provider): Path<String>,
) -> AppResult<impl IntoResponse> {
    let provider = enabled_provider(&oauth, &provider)?;

    let state = generate_token()?;
    let url = oauth.authorization_url(provider, &state)?;
    let cookie = build_cookie(&cookies, OAUTH_STATE_COOKIE, &state, OAUTH_STATE_MAX_AGE_SECS);

    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(&url)))
}

#[utoipa::path(
    get,
    path = "/auth/{provider}/callback",
    params(
        ("provider" = String, Path, description = "google or facebook"),
        CallbackQuery,
    ),
    responses(
        (status = 303, description = "Redirect to the frontend with tokens, or to its login page on failure"),
        (status = 404, description = "Provider unknown or not configured", body = AppError),
    ),
    tag = "oauth"
)]
pub async fn oauth_callback(
    Extension(oauth): Extension<OAuthService>,
    Extension(auth): Extension<AuthService>,
    Extension(cookies): Extension<CookieConfig>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let provider = enabled_provider(&oauth, &provider)?;
    let expected_state = extract_cookie(&headers, OAUTH_STATE_COOKIE);

    let target = match complete_login(&oauth, &auth, provider, query, expected_state).await {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(%provider, "OAuth login failed: {e}");
            oauth.failure_redirect()
        }
    };

    let clear = build_clear_cookie(&cookies, OAUTH_STATE_COOKIE);
    Ok(([(header::SET_COOKIE, clear)], Redirect::to(&target)))
}

async fn complete_login(
    oauth: &OAuthService,
    auth: &AuthService,
    provider: OAuthProvider,
    query: CallbackQuery,
    expected_state: Option<String>,
) -> AppResult<String> {
    if let Some(error) = query.error {
        return Err(AppError::Validation(format!("provider returned error: {error}")));
    }

    match (query.state.as_deref(), expected_state.as_deref()) {
        (Some(got), Some(expected)) if !expected.is_empty() && got == expected => {}
        _ => return Err(AppError::Validation("OAuth state mismatch".to_string())),
    }

    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::Validation("missing authorization code".to_string()))?;

    let profile = oauth.fetch_profile(provider, &code).await?;
    let session = auth.login_with_oauth(provider, &profile).await?;

    oauth.success_redirect(&session.access_token, &session.refresh_token)
}
