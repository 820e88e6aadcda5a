use crate::config::rate_limit::RateLimitConfig;
use crate::handlers;
use crate::middleware::auth::{auth_middleware, authorize_roles, ADMIN_ONLY};
use crate::services::upload::MAX_FILE_SIZE;
use axum::{extract::DefaultBodyLimit, middleware, routing, Router};
use std::time::Duration;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

/// Multipart framing and text fields on top of the largest accepted image.
const PROFILE_BODY_LIMIT: usize = MAX_FILE_SIZE + 64 * 1024;
const LIMITER_EVICTION_INTERVAL: Duration = Duration::from_secs(60);

pub fn create_routes(rate_limit: &RateLimitConfig) -> Router {
    let credentials = credential_routes(rate_limit);
    let oauth = oauth_routes();
    let protected = protected_routes().layer(middleware::from_fn(auth_middleware));
    // Layers run outside-in: authentication first, then the role check.
    let admin = admin_routes()
        .layer(middleware::from_fn_with_state(ADMIN_ONLY, authorize_roles))
        .layer(middleware::from_fn(auth_middleware));

    credentials.merge(oauth).merge(protected).merge(admin)
}

/// Unauthenticated routes that accept credentials or single-use tokens.
fn credential_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/signup", routing::post(handlers::auth::signup))
        .route("/login", routing::post(handlers::auth::login))
        .route("/refresh-token", routing::post(handlers::auth::refresh_token))
        .route(
            "/forgot-password",
            routing::post(handlers::auth::forgot_password),
        )
        .route(
            "/reset-password/{token}",
            routing::post(handlers::auth::reset_password),
        )
        .route(
            "/verify-email/{token}",
            routing::post(handlers::auth::verify_email),
        );

    with_optional_rate_limit(router, config)
}

fn oauth_routes() -> Router {
    Router::new()
        .route(
            "/auth/{provider}",
            routing::get(handlers::oauth::oauth_start),
        )
        .route(
            "/auth/{provider}/callback",
            routing::get(handlers::oauth::oauth_callback),
        )
}

fn protected_routes() -> Router {
    Router::new()
        .route("/logout", routing::post(handlers::auth::logout))
        .route(
            "/profile",
            routing::get(handlers::user::get_profile)
                .put(handlers::user::update_profile)
                .layer(DefaultBodyLimit::max(PROFILE_BODY_LIMIT)),
        )
}

fn admin_routes() -> Router {
    Router::new()
        .route("/admin/users", routing::get(handlers::admin::list_users))
        .route(
            "/admin/users/{id}/role",
            routing::put(handlers::admin::update_user_role),
        )
}

/// Per client IP. Requires the server to be started with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
fn with_optional_rate_limit(router: Router, config: &RateLimitConfig) -> Router {
    if !config.enabled {
        return router;
    }

    let Some(governor_conf) = GovernorConfigBuilder::default()
        .per_millisecond(config.replenish_interval_ms())
        .burst_size(config.requests_per_minute)
        .finish()
    else {
        tracing::error!(
            requests_per_minute = config.requests_per_minute,
            "Invalid rate limit configuration, rate limiting disabled"
        );
        return router;
    };
    let limiter = governor_conf.limiter().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_EVICTION_INTERVAL);
        loop {
            interval.tick().await;
            limiter.retain_recent();
            tracing::debug!(tracked_clients = limiter.len(), "Rate limiter storage pruned");
        }
    });

    router.layer(GovernorLayer::new(governor_conf))
}
