use crate::error::{AppError, AppResult};
use anyhow::Context;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5 MB
pub const AVATAR_SUBDIR: &str = "avatars";

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub upload_dir: PathBuf,
}

impl UploadConfig {
    pub fn from_env() -> Self {
        Self {
            upload_dir: std::env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "./uploads".to_string())
                .into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageKind {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Identify the image from its magic bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            Some(Self::Png)
        } else if data.starts_with(b"GIF8") {
            Some(Self::Gif)
        } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }
}

/// Checks size, declared type and file signature. A missing or generic
/// content type defers to the signature.
pub fn validate_image(data: &[u8], content_type: Option<&str>) -> AppResult<ImageKind> {
    if data.len() > MAX_FILE_SIZE {
        return Err(AppError::PayloadTooLarge);
    }

    let sniffed = ImageKind::sniff(data).ok_or_else(|| {
        AppError::Validation("Unsupported file type. Allowed: jpeg, png, gif, webp".to_string())
    })?;

    match content_type {
        None | Some("application/octet-stream") => Ok(sniffed),
        Some(declared) => match ImageKind::from_content_type(declared) {
            Some(kind) if kind == sniffed => Ok(kind),
            Some(_) => Err(AppError::Validation(
                "File content does not match declared content type".to_string(),
            )),
            None => Err(AppError::Validation(format!(
                "Unsupported file type: {}. Allowed: jpeg, png, gif, webp",
                declared
            ))),
        },
    }
}

pub struct UploadService;

impl UploadService {
    /// Returns the public URL path (e.g. `/uploads/avatars/<uuid>.jpg`).
    pub async fn save_avatar(
        config: &UploadConfig,
        data: &[u8],
        content_type: Option<&str>,
    ) -> AppResult<String> {
        let kind = validate_image(data, content_type)?;

        let filename = format!("{}.{}", Uuid::new_v4(), kind.extension());
        let dir = Path::new(&config.upload_dir).join(AVATAR_SUBDIR);

        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create upload directory {}", dir.display()))?;
        fs::write(dir.join(&filename), data)
            .await
            .context("Failed to write uploaded file")?;

        Ok(format!("/uploads/{}/{}", AVATAR_SUBDIR, filename))
    }
}
