//! Product image upload.
//!
//! Images are written to `ADMIN_UPLOAD_DIR` under a random name and served
//! back from `ADMIN_IMAGE_BASE_URL`. The file type is taken from the leading
//! bytes, not from the client's filename or content type.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::{Json, http::StatusCode};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

/// Accepted image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageKind {
    /// Detect the format from the file's magic bytes.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP".as_slice()) {
            Some(Self::Webp)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }

    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }
}

/// Stored upload.
#[derive(Debug, Serialize)]
pub struct UploadedImage {
    pub url: String,
    pub file_name: String,
    pub content_type: &'static str,
    pub size: usize,
}

fn multipart_error(err: &MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(limit)
    } else {
        AppError::BadRequest(format!("invalid multipart body: {}", err.body_text()))
    }
}

/// Accept one image in the `file` field.
///
/// # Errors
///
/// Returns 400 without a `file` field, 413 over the size limit and 415 for
/// anything that is not JPEG, PNG, WebP or GIF.
#[instrument(skip(state, multipart))]
pub async fn upload(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadedImage>)> {
    let limit = state.config().max_upload_bytes;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(&e, limit))?
        {
            if bytes.len() + chunk.len() > limit {
                return Err(AppError::PayloadTooLarge(limit));
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(AppError::BadRequest("uploaded file is empty".to_string()));
        }

        let kind = ImageKind::sniff(&bytes).ok_or(AppError::UnsupportedMediaType)?;
        let file_name = format!("{}.{}", Uuid::new_v4().simple(), kind.extension());

        let dir = &state.config().upload_dir;
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(dir.join(&file_name), &bytes).await?;

        tracing::info!(file_name = %file_name, size = bytes.len(), "Image uploaded");

        return Ok((
            StatusCode::CREATED,
            Json(UploadedImage {
                url: state.config().image_url(&file_name),
                file_name,
                content_type: kind.content_type(),
                size: bytes.len(),
            }),
        ));
    }

    Err(AppError::BadRequest(format!(
        "missing multipart field `{FILE_FIELD}`"
    )))
}
