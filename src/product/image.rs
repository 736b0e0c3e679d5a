//! Storage of uploaded product images on disk.

use std::path::Path;

use time::OffsetDateTime;

use crate::{Error, product::UploadedImage};

/// Write `image` into `image_dir` and return the stored file name.
///
/// The file name is the upload time in milliseconds followed by the
/// uploaded file name with anything but ASCII letters, digits, `.`, `-`
/// and `_` replaced.
pub async fn save_image(image_dir: &Path, image: &UploadedImage) -> Result<String, Error> {
    let timestamp = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let file_name = format!("{timestamp}-{}", sanitize_file_name(&image.file_name));

    tokio::fs::create_dir_all(image_dir)
        .await
        .map_err(|error| Error::FileError(error.to_string()))?;
    tokio::fs::write(image_dir.join(&file_name), &image.bytes)
        .await
        .map_err(|error| Error::FileError(error.to_string()))?;

    Ok(file_name)
}

/// Remove a stored image. A missing file is logged and otherwise ignored.
pub async fn delete_image(image_dir: &Path, file_name: &str) {
    // Stored names never contain separators, anything else did not come from save_image.
    if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.starts_with('.') {
        tracing::warn!("Refusing to delete image with unexpected name {file_name:?}");
        return;
    }

    if let Err(error) = tokio::fs::remove_file(image_dir.join(file_name)).await {
        tracing::warn!("Could not delete image {file_name}: {error}");
    }
}

fn sanitize_file_name(file_name: &str) -> String {
    let base_name = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim_start_matches('.');

    let sanitized: String = base_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "image".to_owned()
    } else {
        sanitized
    }
}
