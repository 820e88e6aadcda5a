use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{ProfileUpdate, UserResponse};
use crate::services::upload::{UploadConfig, UploadService};
use crate::services::user::UserService;
use axum::{
    extract::{multipart::MultipartError, FromRequest, Multipart, Request},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const PROFILE_PICTURE_FIELD: &str = "profilePicture";

#[derive(Debug, Serialize, ToSchema)]
pub struct UserEnvelope {
    pub user: UserResponse,
}

/// JSON form of a profile update. Multipart requests carry the same fields
/// plus an optional `profilePicture` file.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
}

#[utoipa::path(
    get,
    path = "/profile",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Current user's profile", body = UserEnvelope),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "profile"
)]
pub async fn get_profile(
    Extension(users): Extension<UserService>,
    auth_user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let user = users.get_profile(auth_user.id()).await?;
    Ok(Json(UserEnvelope {
        user: UserResponse::from(user),
    }))
}

#[utoipa::path(
    put,
    path = "/profile",
    security(("jwt_token" = [])),
    request_body(
        content = UpdateProfileRequest,
        description = "JSON, or multipart/form-data with name, bio and an optional profilePicture file"
    ),
    responses(
        (status = 200, description = "Profile updated", body = UserEnvelope),
        (status = 400, description = "Invalid input or unsupported image", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 413, description = "File too large", body = AppError),
    ),
    tag = "profile"
)]
pub async fn update_profile(
    Extension(users): Extension<UserService>,
    Extension(upload_config): Extension<UploadConfig>,
    auth_user: AuthUser,
    request: Request,
) -> AppResult<impl IntoResponse> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let update = if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        read_multipart(multipart, &upload_config).await?
    } else {
        let Json(payload) = Json::<UpdateProfileRequest>::from_request(request, &())
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        ProfileUpdate {
            name: payload.name,
            bio: payload.bio,
            profile_picture: None,
        }
    };

    let user = users.update_profile(auth_user.id(), update).await?;
    Ok(Json(UserEnvelope {
        user: UserResponse::from(user),
    }))
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::Validation(format!("Failed to read upload: {}", e.body_text()))
    }
}

/// Text fields are collected first; the image is written to disk only once
/// the whole body has been read.
async fn read_multipart(
    mut multipart: Multipart,
    config: &UploadConfig,
) -> AppResult<ProfileUpdate> {
    let mut update = ProfileUpdate::default();
    let mut picture: Option<(Vec<u8>, Option<String>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("name") => update.name = Some(field.text().await.map_err(multipart_error)?),
            Some("bio") => update.bio = Some(field.text().await.map_err(multipart_error)?),
            Some(PROFILE_PICTURE_FIELD) => {
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(multipart_error)?;
                // Browsers send an empty part when no file was chosen.
                if !data.is_empty() {
                    picture = Some((data.to_vec(), content_type));
                }
            }
            _ => {}
        }
    }

    if let Some((data, content_type)) = picture {
        let url = UploadService::save_avatar(config, &data, content_type.as_deref()).await?;
        update.profile_picture = Some(url);
    }

    Ok(update)
}
