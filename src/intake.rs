//! Photo submissions: multipart decoding, validation, and the two writes
//! (image, then sidecar) into the pending area.
//!
//! The writes are not transactional. If the image lands and the sidecar
//! write fails, the image stays behind as an orphan; the submitter sees a
//! server error and may simply resubmit under a fresh identifier.
//!
//! The image part is buffered in memory, not streamed to the store, so the
//! form can be validated before anything is written. `MAX_UPLOAD_BYTES`
//! bounds that buffer.

use crate::{
    domain::FileStorage,
    errors::AppError,
    models::{pending_key, sidecar_key, ImageKind, Photo},
};
use axum::extract::Multipart;
use bytes::Bytes;
use chrono::Utc;
use tracing;
use uuid::Uuid;

/// Upper bound on the whole multipart body.
pub const MAX_UPLOAD_BYTES: usize = 15 * 1024 * 1024;

/// Plain-text acknowledgment returned for every accepted submission.
pub const THANK_YOU: &str = "Thank You.\n\nYour upload will be reviewed in 1-2 days.";

/// The `img` part of the form.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

/// Where an accepted submission was written.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: Uuid,
    pub image_key: String,
    pub sidecar_key: String,
}

/// Decodes the recognised form fields. Unknown fields are skipped.
pub async fn read_form(multipart: &mut Multipart) -> Result<(Photo, Option<UploadedImage>), AppError> {
    let mut photo = Photo::default();
    let mut image = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = match field.name() {
            Some(name) => name.to_ascii_lowercase(),
            None => continue,
        };
        match field_name.as_str() {
            "copyright" => photo.copyright = field.text().await?,
            "bike" | "bikemodel" => photo.bike_model = field.text().await?,
            "colors" => photo.colors = field.text().await?,
            "src" | "sourceurl" => photo.source_url = field.text().await?,
            "img" => {
                let file_name = field.file_name().map(|s| s.to_string());
                let content_type = field.content_type().map(|m| m.to_string());
                let data = field.bytes().await?;
                image = Some(UploadedImage { data, content_type, file_name });
            }
            _ => tracing::debug!("Ignoring unknown multipart field: {}", field_name),
        }
    }

    Ok((photo, image))
}

/// Validates a submission and stores it as `uploaded/{id}.{ext}` plus
/// `uploaded/{id}.json`. Nothing is written unless validation passes.
pub async fn submit(
    storage: &dyn FileStorage,
    mut photo: Photo,
    image: Option<UploadedImage>,
) -> Result<Submission, AppError> {
    photo.validate()?;

    let image = image
        .filter(|image| !image.data.is_empty())
        .ok_or(AppError::MissingFile)?;

    // Declared type first; fall back to the file signature.
    let kind = image
        .content_type
        .as_deref()
        .and_then(ImageKind::from_content_type)
        .or_else(|| ImageKind::sniff(&image.data))
        .ok_or_else(|| {
            tracing::info!(content_type = ?image.content_type, file_name = ?image.file_name, "Rejecting upload that is not JPEG or PNG");
            AppError::UnsupportedImage
        })?;

    let id = Uuid::new_v4();
    let filename = format!("{}.{}", id, kind.extension());
    let image_key = pending_key(&filename);
    let sidecar_key = sidecar_key(&id.to_string());

    tracing::info!(%id, s3_key = %image_key, file_name = ?image.file_name, "Storing submitted image");
    storage
        .upload(&image_key, image.data, Some(kind.content_type().to_string()))
        .await?;

    photo.submitted_at = Some(Utc::now());
    photo.image_reference = filename;
    let sidecar = serde_json::to_vec(&photo)
        .map_err(|e| AppError::InternalServerError(format!("Failed to encode metadata for {}: {}", id, e)))?;

    storage
        .upload(&sidecar_key, Bytes::from(sidecar), Some("application/json".to_string()))
        .await?;

    tracing::info!(%id, "Submission stored for review");
    Ok(Submission { id, image_key, sidecar_key })
}
