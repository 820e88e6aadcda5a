use crate::error::{AppError, AppResult};
use crate::handlers::MessageResponse;
use crate::middleware::AuthUser;
use crate::models::UserResponse;
use crate::services::auth::{AuthService, AuthSession, FORGOT_PASSWORD_MESSAGE};
use axum::{extract::Path, http::StatusCode, response::IntoResponse, Extension, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    /// Display name (1-255 characters)
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: String,
    /// Email address
    #[validate(email(message = "Please provide a valid email address"))]
    pub email: String,
    /// Password; must satisfy the strength policy
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserResponse,
    /// JWT access token
    pub token: String,
    /// JWT refresh token
    pub refresh_token: String,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            user: UserResponse::from(session.user),
            token: session.access_token,
            refresh_token: session.refresh_token,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub password: String,
}

/// Name is trimmed before the length check so "   " is rejected.
fn validate_signup(payload: &SignupRequest) -> AppResult<()> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation(
            "Name must be between 1 and 255 characters".to_string(),
        ));
    }
    payload.validate().map_err(|e| {
        let message = e
            .field_errors()
            .values()
            .flat_map(|errors| errors.iter())
            .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| format!("Validation error: {e}"));
        AppError::Validation(message)
    })
}

#[utoipa::path(
    post,
    path = "/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created", body = AuthResponse),
        (status = 400, description = "Duplicate email, invalid input or weak password", body = AppError),
        (status = 429, description = "Too many requests"),
    ),
    tag = "auth"
)]
pub async fn signup(
    Extension(auth): Extension<AuthService>,
    Json(payload): Json<SignupRequest>,
) -> AppResult<impl IntoResponse> {
    validate_signup(&payload)?;

    let session = auth
        .signup(&payload.name, &payload.email, &payload.password)
        .await?;

    Ok((StatusCode::CREATED, Json(AuthResponse::from(session))))
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid email or password", body = AppError),
        (status = 403, description = "Account locked", body = AppError),
        (status = 429, description = "Too many requests"),
    ),
    tag = "auth"
)]
pub async fn login(
    Extension(auth): Extension<AuthService>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let session = auth.login(&payload.email, &payload.password).await?;
    Ok(Json(AuthResponse::from(session)))
}

#[utoipa::path(
    post,
    path = "/refresh-token",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New access token", body = TokenResponse),
        (status = 401, description = "Invalid or revoked refresh token", body = AppError),
    ),
    tag = "auth"
)]
pub async fn refresh_token(
    Extension(auth): Extension<AuthService>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AppResult<impl IntoResponse> {
    let refresh_token = payload
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized)?;

    let token = auth.refresh(&refresh_token).await?;
    Ok(Json(TokenResponse { token }))
}

#[utoipa::path(
    post,
    path = "/logout",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "auth"
)]
pub async fn logout(
    Extension(auth): Extension<AuthService>,
    auth_user: AuthUser,
) -> AppResult<impl IntoResponse> {
    auth.logout(auth_user.id()).await?;
    Ok(Json(MessageResponse::new("Logged out successfully")))
}

#[utoipa::path(
    post,
    path = "/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Always returned, whether or not the email exists", body = MessageResponse),
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    Extension(auth): Extension<AuthService>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    auth.forgot_password(&payload.email).await?;
    Ok(Json(MessageResponse::new(FORGOT_PASSWORD_MESSAGE)))
}

#[utoipa::path(
    post,
    path = "/reset-password/{token}",
    params(("token" = String, Path, description = "Password reset token from the email link")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid or expired token, or weak password", body = AppError),
    ),
    tag = "auth"
)]
pub async fn reset_password(
    Extension(auth): Extension<AuthService>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    auth.reset_password(&token, &payload.password).await?;
    Ok(Json(MessageResponse::new("Password has been reset successfully")))
}

#[utoipa::path(
    post,
    path = "/verify-email/{token}",
    params(("token" = String, Path, description = "Verification token from the email link")),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = AppError),
    ),
    tag = "auth"
)]
pub async fn verify_email(
    Extension(auth): Extension<AuthService>,
    Path(token): Path<String>,
) -> AppResult<impl IntoResponse> {
    auth.verify_email(&token).await?;
    Ok(Json(MessageResponse::new("Email verified successfully")))
}
