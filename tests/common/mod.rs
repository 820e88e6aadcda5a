#![allow(dead_code)]

use reqwest::{redirect::Policy, Client, Response};
use serde_json::Value;
use signscribe::config::{
    auth::AuthConfig, jwt::JwtConfig, oauth::OAuthConfig, rate_limit::RateLimitConfig,
};
use signscribe::models::Role;
use signscribe::services::{
    admin::AdminService, auth::AuthService, email::EmailService, email::MemoryOutbox,
    oauth::OAuthService, upload::UploadConfig, user::UserService,
};
use signscribe::store::{MemoryUserStore, SharedUserStore, UserStore};
use signscribe::utils::{cookie::CookieConfig, Clock, ManualClock, TokenIssuer};
use signscribe::{create_app, AppServices};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const STRONG_PASSWORD: &str = "Str0ng!Pass";
pub const FRONTEND_URL: &str = "http://frontend.test";

pub struct TestOptions {
    pub rate_limit: RateLimitConfig,
    pub oauth: OAuthConfig,
    pub send_verification_email: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig {
                enabled: false,
                requests_per_minute: 60,
            },
            oauth: OAuthConfig {
                frontend_url: FRONTEND_URL.to_string(),
                ..Default::default()
            },
            send_verification_email: false,
        }
    }
}

pub struct TestApp {
    pub addr: String,
    pub client: Client,
    pub store: SharedUserStore,
    pub clock: ManualClock,
    pub outbox: Arc<MemoryOutbox>,
    pub upload_dir: PathBuf,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    pub async fn signup(&self, name: &str, email: &str, password: &str) -> Response {
        self.client
            .post(self.url("/signup"))
            .json(&serde_json::json!({ "name": name, "email": email, "password": password }))
            .send()
            .await
            .expect("signup request failed")
    }

    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.client
            .post(self.url("/login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("login request failed")
    }

    /// Signs up with [`STRONG_PASSWORD`] and returns the response body.
    pub async fn create_user(&self, name: &str, email: &str) -> Value {
        let resp = self.signup(name, email, STRONG_PASSWORD).await;
        let status = resp.status();
        let body: Value = resp.json().await.expect("signup response was not JSON");
        assert_eq!(status, 201, "signup failed: {body}");
        body
    }

    pub async fn make_admin(&self, user_id: i64) {
        self.store
            .update_role(user_id as i32, Role::Admin, self.clock.now())
            .await
            .expect("role update failed")
            .expect("user not found");
    }

    /// Waits for the detached mail task, then pulls the token out of the link
    /// whose path starts with `prefix` (e.g. `/reset-password/`).
    pub async fn emailed_token(&self, to: &str, prefix: &str) -> String {
        for _ in 0..100 {
            let token = self.outbox.messages().into_iter().rev().find_map(|m| {
                if m.to != to {
                    return None;
                }
                let marker = format!("{FRONTEND_URL}{prefix}");
                let start = m.body.find(&marker)? + marker.len();
                let token: String = m.body[start..]
                    .chars()
                    .take_while(|c| c.is_ascii_hexdigit())
                    .collect();
                (!token.is_empty()).then_some(token)
            });
            if let Some(token) = token {
                return token;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("no email with {prefix} link was sent to {to}");
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(TestOptions::default()).await
}

pub async fn spawn_app_with(options: TestOptions) -> TestApp {
    let jwt = JwtConfig::new(
        "integration_access_secret_at_least_32_characters".to_string(),
        "integration_refresh_secret_at_least_32_characters".to_string(),
        900,
        604800,
    )
    .expect("invalid JWT config");

    let store: SharedUserStore = Arc::new(MemoryUserStore::new());
    let clock = ManualClock::default();
    let outbox = Arc::new(MemoryOutbox::new());

    let auth_config = AuthConfig {
        send_verification_email: options.send_verification_email,
        frontend_url: FRONTEND_URL.to_string(),
        ..AuthConfig::default()
    };
    let email = EmailService::new(
        Some(outbox.clone()),
        FRONTEND_URL.to_string(),
        Duration::from_secs(2),
    );

    let upload_dir = std::env::temp_dir().join(format!("signscribe-test-{}", uuid::Uuid::new_v4()));

    let services = AppServices {
        auth: AuthService::new(
            store.clone(),
            TokenIssuer::new(&jwt),
            auth_config,
            email,
            Arc::new(clock.clone()),
        ),
        users: UserService::new(store.clone(), Arc::new(clock.clone())),
        admin: AdminService::new(store.clone(), Arc::new(clock.clone())),
        oauth: OAuthService::new(options.oauth).expect("failed to build OAuth client"),
        upload: UploadConfig {
            upload_dir: upload_dir.clone(),
        },
        cookies: CookieConfig::default(),
        store: store.clone(),
    };

    let app = create_app(services, &options.rate_limit);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let client = Client::builder()
        .redirect(Policy::none())
        .build()
        .expect("failed to build client");

    TestApp {
        addr: format!("http://{}", addr),
        client,
        store,
        clock,
        outbox,
        upload_dir,
    }
}
