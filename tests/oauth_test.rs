mod common;

use axum::{
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use common::{FRONTEND_URL, STRONG_PASSWORD};
use reqwest::Url;
use serde_json::{json, Value};
use signscribe::config::oauth::{OAuthConfig, OAuthProviderConfig};
use signscribe::store::UserStore;
use std::collections::HashMap;

const CLIENT_ID: &str = "fake-client";

/// Stands in for Google: the code picks which profile the userinfo endpoint returns.
async fn spawn_fake_provider() -> String {
    async fn token(Form(form): Form<HashMap<String, String>>) -> Result<Json<Value>, StatusCode> {
        if form.get("client_id").map(String::as_str) != Some(CLIENT_ID)
            || form.get("grant_type").map(String::as_str) != Some("authorization_code")
        {
            return Err(StatusCode::BAD_REQUEST);
        }
        let code = form.get("code").ok_or(StatusCode::BAD_REQUEST)?;
        Ok(Json(json!({ "access_token": format!("tok-{code}"), "token_type": "Bearer" })))
    }

    async fn userinfo(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(StatusCode::UNAUTHORIZED)?;
        let code = bearer.strip_prefix("tok-").ok_or(StatusCode::UNAUTHORIZED)?;

        let profile = match code {
            "noemail" => json!({ "sub": "g-noemail", "name": "No Email" }),
            // A different Google account that reports someone else's email.
            other if other.starts_with("alt-") => json!({
                "sub": format!("g-{other}"),
                "email": format!("{}@example.com", &other[4..]),
                "name": format!("Google {other}"),
            }),
            other => json!({
                "sub": format!("g-{other}"),
                "email": format!("{other}@example.com"),
                "name": format!("Google {other}"),
                "picture": format!("https://pictures.example/{other}.jpg"),
            }),
        };
        Ok(Json(profile))
    }

    let app = Router::new()
        .route("/token", post(token))
        .route("/userinfo", get(userinfo));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn spawn_with_google() -> common::TestApp {
    let provider = spawn_fake_provider().await;
    common::spawn_app_with(common::TestOptions {
        oauth: OAuthConfig {
            google: Some(OAuthProviderConfig {
                client_id: CLIENT_ID.to_string(),
                client_secret: "fake-secret".to_string(),
                callback_url: "http://localhost/auth/google/callback".to_string(),
                authorize_url: format!("{provider}/authorize"),
                token_url: format!("{provider}/token"),
                userinfo_url: format!("{provider}/userinfo"),
                scope: "openid profile email".to_string(),
            }),
            facebook: None,
            frontend_url: FRONTEND_URL.to_string(),
        },
        ..Default::default()
    })
    .await
}

fn location(resp: &reqwest::Response) -> Url {
    let raw = resp
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap();
    Url::parse(raw).unwrap()
}

fn query(url: &Url) -> HashMap<String, String> {
    url.query_pairs().into_owned().collect()
}

/// Starts the flow and returns the state value stored in the cookie.
async fn start(app: &common::TestApp) -> String {
    let resp = app.client.get(app.url("/auth/google")).send().await.unwrap();
    assert_eq!(resp.status(), 303);

    let cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .expect("missing state cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("oauth_state="));
    assert!(cookie.contains("HttpOnly"));
    let state = cookie
        .trim_start_matches("oauth_state=")
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let target = location(&resp);
    assert!(target.path().ends_with("/authorize"));
    let params = query(&target);
    assert_eq!(params["state"], state);
    assert_eq!(params["client_id"], CLIENT_ID);
    state
}

async fn callback(app: &common::TestApp, code: &str, state: &str, cookie_state: &str) -> Url {
    let resp = app
        .client
        .get(app.url(&format!("/auth/google/callback?code={code}&state={state}")))
        .header(header::COOKIE, format!("oauth_state={cookie_state}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 303);
    location(&resp)
}

#[tokio::test]
async fn google_login_creates_verified_user() {
    let app = spawn_with_google().await;
    let state = start(&app).await;

    let target = callback(&app, "newbie", &state, &state).await;
    assert!(target.as_str().starts_with(&format!("{FRONTEND_URL}/auth/success")));
    let params = query(&target);

    let resp = app
        .client
        .get(app.url("/profile"))
        .bearer_auth(&params["token"])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"]["email"], "newbie@example.com");
    assert_eq!(body["user"]["name"], "Google newbie");
    assert_eq!(body["user"]["isEmailVerified"], true);
    assert_eq!(
        body["user"]["profilePicture"],
        "https://pictures.example/newbie.jpg"
    );

    let resp = app
        .client
        .post(app.url("/refresh-token"))
        .json(&json!({ "refreshToken": params["refreshToken"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // OAuth-only accounts cannot log in with a password.
    let resp = app.login("newbie@example.com", "OAUTH_GOOGLE").await;
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn google_login_links_existing_account() {
    let app = spawn_with_google().await;
    let local = app.create_user("Alice", "alice@example.com").await;
    let local_id = local["user"]["id"].as_i64().unwrap();

    let state = start(&app).await;
    let target = callback(&app, "alice", &state, &state).await;
    let params = query(&target);

    let resp = app
        .client
        .get(app.url("/profile"))
        .bearer_auth(&params["token"])
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"]["id"], local_id);
    assert_eq!(body["user"]["name"], "Alice");

    // A second OAuth login finds the account by provider id.
    let state = start(&app).await;
    let target = callback(&app, "alice", &state, &state).await;
    assert!(target.as_str().starts_with(&format!("{FRONTEND_URL}/auth/success")));

    assert_eq!(app.login("alice@example.com", STRONG_PASSWORD).await.status(), 200);
}

#[tokio::test]
async fn state_mismatch_redirects_to_failure() {
    let app = spawn_with_google().await;
    let state = start(&app).await;

    let target = callback(&app, "mallory", "forged-state", &state).await;
    assert_eq!(target.as_str(), format!("{FRONTEND_URL}/login?error=oauth_failed"));

    let resp = app.login("mallory@example.com", STRONG_PASSWORD).await;
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn profile_without_email_is_rejected() {
    let app = spawn_with_google().await;
    let state = start(&app).await;

    let target = callback(&app, "noemail", &state, &state).await;
    assert_eq!(target.as_str(), format!("{FRONTEND_URL}/login?error=oauth_failed"));
}

#[tokio::test]
async fn unconfigured_or_unknown_providers_are_not_found() {
    let app = spawn_with_google().await;

    let resp = app.client.get(app.url("/auth/facebook")).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    let resp = app.client.get(app.url("/auth/twitter")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn linked_account_is_not_taken_over_by_another_subject() {
    let app = spawn_with_google().await;
    app.create_user("Alice", "alice@example.com").await;

    let state = start(&app).await;
    let target = callback(&app, "alice", &state, &state).await;
    assert!(target.as_str().starts_with(&format!("{FRONTEND_URL}/auth/success")));

    let state = start(&app).await;
    let target = callback(&app, "alt-alice", &state, &state).await;
    assert_eq!(target.as_str(), format!("{FRONTEND_URL}/login?error=oauth_failed"));

    let stored = app
        .store
        .find_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.google_id.as_deref(), Some("g-alice"));
}

#[tokio::test]
async fn locked_account_cannot_sign_in_with_google() {
    let app = spawn_with_google().await;
    app.create_user("Alice", "alice@example.com").await;
    for _ in 0..5 {
        app.login("alice@example.com", "Wr0ng!Pass").await;
    }

    let state = start(&app).await;
    let target = callback(&app, "alice", &state, &state).await;
    assert_eq!(target.as_str(), format!("{FRONTEND_URL}/login?error=oauth_failed"));

    // The lock is still in place.
    let resp = app.login("alice@example.com", STRONG_PASSWORD).await;
    assert_eq!(resp.status(), 403);
}
