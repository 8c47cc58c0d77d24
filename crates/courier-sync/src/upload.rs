//! Multipart image parts.
//!
//! Each image field carries exactly one file, named after the last URI
//! segment with a MIME type guessed from its extension. A field whose local
//! value still equals the server's copy is left out of the form entirely.

use reqwest::multipart::{Form, Part};
use tracing::debug;

use courier_core::ImageSource;

use crate::error::{ClientError, ClientResult};

/// Reads the file behind `image` into a multipart part.
pub async fn image_part(field: &str, image: &ImageSource) -> ClientResult<Part> {
    let path = image.uri.strip_prefix("file://").unwrap_or(&image.uri);
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ClientError::invalid_field(field, format!("Cannot read {field}: {e}")))?;

    debug!(field, file = image.filename(), bytes = bytes.len(), "Attaching image");
    Part::bytes(bytes)
        .file_name(image.filename().to_string())
        .mime_str(image.mime())
        .map_err(ClientError::from)
}

/// Adds `image` under `field` unless it is absent or unchanged from `baseline`.
pub async fn attach_image(
    form: Form,
    field: &'static str,
    image: Option<&ImageSource>,
    baseline: Option<&str>,
) -> ClientResult<Form> {
    match image {
        Some(image) if image.differs_from(baseline) => {
            let part = image_part(field, image).await?;
            Ok(form.part(field, part))
        }
        Some(_) => {
            debug!(field, "Image unchanged, omitting");
            Ok(form)
        }
        None => Ok(form),
    }
}
