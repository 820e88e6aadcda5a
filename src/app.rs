use crate::config::rate_limit::RateLimitConfig;
use crate::routes;
use crate::services::{
    admin::AdminService, auth::AuthService, oauth::OAuthService, upload::UploadConfig,
    user::UserService,
};
use crate::store::SharedUserStore;
use crate::utils::cookie::CookieConfig;
use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use std::env;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        crate::handlers::auth::signup,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh_token,
        crate::handlers::auth::logout,
        crate::handlers::auth::forgot_password,
        crate::handlers::auth::reset_password,
        crate::handlers::auth::verify_email,
        crate::handlers::oauth::oauth_start,
        crate::handlers::oauth::oauth_callback,
        crate::handlers::user::get_profile,
        crate::handlers::user::update_profile,
        crate::handlers::admin::list_users,
        crate::handlers::admin::update_user_role,
    ),
    components(
        schemas(
            crate::error::AppError,
            crate::models::Role,
            crate::models::UserResponse,
            crate::handlers::MessageResponse,
            crate::handlers::auth::SignupRequest,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::AuthResponse,
            crate::handlers::auth::RefreshTokenRequest,
            crate::handlers::auth::TokenResponse,
            crate::handlers::auth::ForgotPasswordRequest,
            crate::handlers::auth::ResetPasswordRequest,
            crate::handlers::user::UserEnvelope,
            crate::handlers::user::UpdateProfileRequest,
            crate::handlers::admin::UpdateRoleRequest,
            crate::handlers::admin::UserListResponse,
        )
    ),
    modifiers(&JwtSecurity),
    tags(
        (name = "auth", description = "Signup, login, tokens and password reset"),
        (name = "oauth", description = "Google and Facebook sign-in"),
        (name = "profile", description = "The authenticated user's profile"),
        (name = "admin", description = "User and role administration"),
    )
)]
pub struct ApiDoc;

struct JwtSecurity;

impl Modify for JwtSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Everything the handlers pull out of request extensions.
#[derive(Clone)]
pub struct AppServices {
    pub store: SharedUserStore,
    pub auth: AuthService,
    pub users: UserService,
    pub admin: AdminService,
    pub oauth: OAuthService,
    pub upload: UploadConfig,
    pub cookies: CookieConfig,
}

pub fn create_app(services: AppServices, rate_limit: &RateLimitConfig) -> Router {
    let upload_dir = services.upload.upload_dir.clone();

    Router::new()
        .route("/", get(health_check))
        .merge(routes::create_routes(rate_limit))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(Extension(services.store))
        .layer(Extension(services.auth))
        .layer(Extension(services.users))
        .layer(Extension(services.admin))
        .layer(Extension(services.oauth))
        .layer(Extension(services.upload))
        .layer(Extension(services.cookies))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}

pub fn build_cors_layer() -> CorsLayer {
    use axum::http::{header, HeaderValue, Method};

    let origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins_str == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = origins_str
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service status", body = serde_json::Value)
    )
)]
async fn health_check(Extension(store): Extension<SharedUserStore>) -> impl IntoResponse {
    let store_ok = match store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Health check: store unavailable: {e}");
            false
        }
    };

    let status = if store_ok { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "service": "SignScribe API",
        "version": env!("CARGO_PKG_VERSION"),
        "database": store_ok,
    }))
}
