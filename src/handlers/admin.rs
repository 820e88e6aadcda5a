use crate::error::{AppError, AppResult};
use crate::handlers::user::UserEnvelope;
use crate::models::UserResponse;
use crate::services::admin::AdminService;
use axum::{extract::Path, response::IntoResponse, Extension, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    /// One of: user, moderator, admin
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
}

#[utoipa::path(
    get,
    path = "/admin/users",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "All users, ordered by id", body = UserListResponse),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 403, description = "Admin role required", body = AppError),
    ),
    tag = "admin"
)]
pub async fn list_users(
    Extension(admin): Extension<AdminService>,
) -> AppResult<impl IntoResponse> {
    let users = admin.list_users().await?;
    Ok(Json(UserListResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
    }))
}

#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UserEnvelope),
        (status = 400, description = "Invalid role", body = AppError),
        (status = 403, description = "Admin role required", body = AppError),
        (status = 404, description = "User not found", body = AppError),
    ),
    tag = "admin"
)]
pub async fn update_user_role(
    Extension(admin): Extension<AdminService>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateRoleRequest>,
) -> AppResult<impl IntoResponse> {
    let user = admin.update_user_role(id, &payload.role).await?;
    Ok(Json(UserEnvelope {
        user: UserResponse::from(user),
    }))
}
