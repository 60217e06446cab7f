use chrono::Utc;
use std::path::Path;
use uuid::Uuid;

use crate::{
    config::MediaConfig,
    error::{AppError, Result},
    models::UploadResponse,
    storage::StorageState,
};

/// Hard ceiling on a single uploaded image: 5 MiB.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const DEFAULT_EXTENSION: &str = "jpg";
const MAX_EXTENSION_CHARS: usize = 10;

/// Type first, then size. A missing content type counts as not an image.
pub fn validate_upload(content_type: Option<&str>, len: usize) -> Result<()> {
    let is_image = content_type
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false);
    if !is_image {
        return Err(AppError::UnsupportedType);
    }
    if len > MAX_UPLOAD_BYTES {
        return Err(AppError::TooLarge {
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

/// Extension of the client's filename, lowercased; `jpg` when there is none or it
/// contains anything but ASCII letters and digits.
fn extension_of(filename: Option<&str>) -> String {
    filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_CHARS
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// storage_name
///
/// `{yyyymmddHHMMSS}_{uuid}.{ext}`. The random part makes names unique across
/// concurrent requests without any coordination.
pub fn storage_name(original_filename: Option<&str>) -> String {
    format!(
        "{}_{}.{}",
        Utc::now().format("%Y%m%d%H%M%S"),
        Uuid::new_v4().simple(),
        extension_of(original_filename)
    )
}

/// upload
///
/// Validates, names, and persists one image, returning the stored name (usable as a
/// news `image_url`) and its public URL.
pub async fn upload(
    storage: &StorageState,
    media: &MediaConfig,
    bytes: &[u8],
    content_type: Option<&str>,
    original_filename: Option<&str>,
) -> Result<UploadResponse> {
    validate_upload(content_type, bytes.len())?;

    let filename = storage_name(original_filename);
    storage.save(&filename, bytes).await?;

    let url = public_url(media, &filename);
    tracing::info!(filename = %filename, size = bytes.len(), "image stored");
    Ok(UploadResponse { filename, url })
}

fn is_absolute_url(image_ref: &str) -> bool {
    let lower = image_ref.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn public_url(media: &MediaConfig, image_ref: &str) -> String {
    let host = media.server_host.trim_end_matches('/');
    let path = media.upload_path.trim_matches('/');
    let name = image_ref.trim_start_matches('/');
    if path.is_empty() {
        format!("{host}/{name}")
    } else {
        format!("{host}/{path}/{name}")
    }
}

/// resolve_public_url
///
/// `None` for a missing or blank ref, absolute URLs unchanged, anything else joined
/// onto `{server_host}/{upload_path}/`.
pub fn resolve_public_url(media: &MediaConfig, image_ref: Option<&str>) -> Option<String> {
    let image_ref = image_ref.map(str::trim).filter(|r| !r.is_empty())?;
    if is_absolute_url(image_ref) {
        Some(image_ref.to_string())
    } else {
        Some(public_url(media, image_ref))
    }
}
