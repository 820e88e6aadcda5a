mod common;

use common::STRONG_PASSWORD;
use serde_json::Value;

#[tokio::test]
async fn health_check_reports_store() {
    let app = common::spawn_app().await;

    let resp = app.client.get(app.url("/")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn signup_returns_sanitized_user_and_tokens() {
    let app = common::spawn_app().await;

    let resp = app.signup("Alice", "Alice@Example.com", STRONG_PASSWORD).await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();

    assert!(body["token"].as_str().is_some());
    assert!(body["refreshToken"].as_str().is_some());
    let user = &body["user"];
    assert_eq!(user["name"], "Alice");
    assert_eq!(user["email"], "alice@example.com");
    assert_eq!(user["role"], "user");
    assert_eq!(user["isEmailVerified"], false);

    let user = user.as_object().unwrap();
    for secret in [
        "passwordHash",
        "password_hash",
        "refreshToken",
        "refresh_token",
        "failedLoginAttempts",
        "failed_login_attempts",
        "passwordResetToken",
        "password_reset_token",
    ] {
        assert!(!user.contains_key(secret), "user leaked {secret}");
    }
}

#[tokio::test]
async fn signup_rejects_duplicate_email_case_insensitively() {
    let app = common::spawn_app().await;
    app.create_user("Bob", "bob@example.com").await;

    let resp = app.signup("Bobby", "BOB@example.com", STRONG_PASSWORD).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "User with this email already exists");
}

#[tokio::test]
async fn signup_rejects_weak_password_and_bad_input() {
    let app = common::spawn_app().await;

    let resp = app.signup("Carol", "carol@example.com", "password").await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Password must be at least 8 characters long"));

    let resp = app.signup("Carol", "not-an-email", STRONG_PASSWORD).await;
    assert_eq!(resp.status(), 400);

    let resp = app.signup("", "carol@example.com", STRONG_PASSWORD).await;
    assert_eq!(resp.status(), 400);

    // Nothing was created by the rejected attempts.
    let resp = app.signup("Carol", "carol@example.com", STRONG_PASSWORD).await;
    assert_eq!(resp.status(), 201);
}

#[tokio::test]
async fn login_succeeds_and_updates_last_login() {
    let app = common::spawn_app().await;
    app.create_user("Dave", "dave@example.com").await;

    let resp = app.login("DAVE@example.com", STRONG_PASSWORD).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["token"].as_str().is_some());
    assert!(body["refreshToken"].as_str().is_some());
    assert_eq!(body["user"]["email"], "dave@example.com");
    assert!(!body["user"]["lastLogin"].is_null());
}

#[tokio::test]
async fn unknown_email_and_wrong_password_look_alike() {
    let app = common::spawn_app().await;
    app.create_user("Erin", "erin@example.com").await;

    let unknown = app.login("nobody@example.com", STRONG_PASSWORD).await;
    assert_eq!(unknown.status(), 401);
    let unknown: Value = unknown.json().await.unwrap();

    let wrong = app.login("erin@example.com", "Wr0ng!Pass").await;
    assert_eq!(wrong.status(), 401);
    let wrong: Value = wrong.json().await.unwrap();

    assert_eq!(unknown["error"], "Invalid email or password");
    assert_eq!(unknown["error"], wrong["error"]);
    assert!(unknown.get("attemptsRemaining").is_none());
    assert_eq!(wrong["attemptsRemaining"], 4);
}

#[tokio::test]
async fn refresh_token_issues_new_access_token() {
    let app = common::spawn_app().await;
    let body = app.create_user("Fay", "fay@example.com").await;
    let refresh = body["refreshToken"].as_str().unwrap();

    let resp = app
        .client
        .post(app.url("/refresh-token"))
        .json(&serde_json::json!({ "refreshToken": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let token = body["token"].as_str().unwrap();

    let resp = app
        .client
        .get(app.url("/profile"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn refresh_token_rejects_missing_and_wrong_tokens() {
    let app = common::spawn_app().await;
    let body = app.create_user("Gus", "gus@example.com").await;
    let access = body["token"].as_str().unwrap();

    let resp = app
        .client
        .post(app.url("/refresh-token"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // An access token is signed with a different secret.
    let resp = app
        .client
        .post(app.url("/refresh-token"))
        .json(&serde_json::json!({ "refreshToken": access }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn new_login_replaces_previous_refresh_token() {
    let app = common::spawn_app().await;
    let first = app.create_user("Hal", "hal@example.com").await;
    let old_refresh = first["refreshToken"].as_str().unwrap().to_string();

    let resp = app.login("hal@example.com", STRONG_PASSWORD).await;
    assert_eq!(resp.status(), 200);

    let resp = app
        .client
        .post(app.url("/refresh-token"))
        .json(&serde_json::json!({ "refreshToken": old_refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn refresh_fails_after_logout() {
    let app = common::spawn_app().await;
    let body = app.create_user("Ivy", "ivy@example.com").await;
    let access = body["token"].as_str().unwrap();
    let refresh = body["refreshToken"].as_str().unwrap();

    let resp = app
        .client
        .post(app.url("/logout"))
        .bearer_auth(access)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["message"].as_str().is_some());

    let resp = app
        .client
        .post(app.url("/refresh-token"))
        .json(&serde_json::json!({ "refreshToken": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn protected_routes_require_valid_bearer_token() {
    let app = common::spawn_app().await;

    let resp = app.client.post(app.url("/logout")).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = app
        .client
        .get(app.url("/profile"))
        .bearer_auth("not.a.jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn email_verification_flow() {
    let app = common::spawn_app_with(common::TestOptions {
        send_verification_email: true,
        ..Default::default()
    })
    .await;
    let body = app.create_user("Jo", "jo@example.com").await;
    assert_eq!(body["user"]["isEmailVerified"], false);
    let access = body["token"].as_str().unwrap().to_string();

    let token = app.emailed_token("jo@example.com", "/verify-email/").await;

    let resp = app
        .client
        .post(app.url(&format!("/verify-email/{token}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = app
        .client
        .get(app.url("/profile"))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"]["isEmailVerified"], true);

    // Single use.
    let resp = app
        .client
        .post(app.url(&format!("/verify-email/{token}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
