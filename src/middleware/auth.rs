use crate::{
    error::AppError,
    models::{Role, UserModel},
    services::auth::AuthService,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Extension,
};

pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// The authenticated user, loaded fresh from the store for this request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: UserModel,
}

impl AuthUser {
    pub fn id(&self) -> i32 {
        self.user.id
    }
}

/// Verifies the bearer access token and attaches the user to the request.
pub async fn auth_middleware(
    Extension(auth): Extension<AuthService>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&headers).ok_or(AppError::Unauthorized)?;

    let user = auth
        .authenticate_access_token(&token)
        .await
        .map_err(|e| match e {
            AppError::InvalidToken => AppError::InvalidToken,
            AppError::Database(_) | AppError::Internal(_) => e,
            _ => AppError::Unauthorized,
        })?;

    request.extensions_mut().insert(AuthUser { user });
    Ok(next.run(request).await)
}

/// Must run after [`auth_middleware`].
pub async fn authorize_roles(
    State(allowed): State<&'static [Role]>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AppError::Unauthorized)?;

    let role = auth_user.user.role();
    if !allowed.contains(&role) {
        tracing::info!(user_id = auth_user.id(), %role, "Role not permitted");
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;

    let token = auth_header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
