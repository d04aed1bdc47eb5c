use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::borrow::Cow;
use image::ImageFormat;
use log::{error, info};

use crate::error::{PortalError, Result};

/// Format of the stored file name, one per upload second
pub const UPLOAD_NAME_FORMAT: &str = "%Y_%m_%d_%H_%M_%S.jpeg";

/// Type sent to the store when the browser declared none
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Image received from the upload form
#[derive(Debug, Clone, Default)]
pub struct UploadPayload {
    pub bytes: Vec<u8>,
    /// MIME type declared by the browser
    pub content_type: String,
    /// Original file name, used only to check the extension
    pub file_name: String,
}

impl UploadPayload {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Make sure there is a JPEG to send
    ///
    /// # Errors
    /// * `PortalError::MissingFile` when no file (or an empty one) was sent
    /// * `PortalError::InvalidFile` when the declared type, the extension or
    ///   the content is not JPEG
    pub fn validate(&self) -> Result<()> {
        if self.bytes.is_empty() {
            return Err(PortalError::MissingFile);
        }

        let extension = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !matches!(extension.as_str(), "jpg" | "jpeg") {
            return Err(PortalError::InvalidFile(format!(
                "unexpected file name {}",
                self.file_name
            )));
        }

        if !self.content_type.is_empty()
            && !matches!(
                self.content_type.as_str(),
                "image/jpeg" | "image/jpg" | "image/pjpeg"
            )
        {
            return Err(PortalError::InvalidFile(format!(
                "unexpected type {}",
                self.content_type
            )));
        }

        match image::guess_format(&self.bytes) {
            Ok(ImageFormat::Jpeg) => Ok(()),
            Ok(other) => Err(PortalError::InvalidFile(format!("content is {:?}", other))),
            Err(_) => Err(PortalError::InvalidFile("content is not an image".to_string())),
        }
    }

    /// The payload as it goes to the store, with a declared type filled in
    pub fn with_default_type(&self) -> Cow<'_, UploadPayload> {
        if self.content_type.is_empty() {
            Cow::Owned(UploadPayload {
                content_type: DEFAULT_CONTENT_TYPE.to_string(),
                ..self.clone()
            })
        } else {
            Cow::Borrowed(self)
        }
    }
}

/// Remote storage for uploaded images
#[async_trait]
pub trait ImageStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    /// Store `payload` as `name` inside `folder_id`, returning the file id
    async fn upload(
        &self,
        name: &str,
        folder_id: &str,
        payload: &UploadPayload,
    ) -> std::result::Result<String, String>;
}

/// Destination name for an upload made at `at`
pub fn upload_name(at: NaiveDateTime) -> String {
    at.format(UPLOAD_NAME_FORMAT).to_string()
}

/// Validate, name and send one image
///
/// # Returns
/// * `Result<String>` - The stored file name
///
/// # Errors
/// * Validation errors from [`UploadPayload::validate`]
/// * `PortalError::Upload` carrying the store's message; nothing is retried
pub async fn dispatch_upload(
    store: &dyn ImageStore,
    folder_id: &str,
    payload: &UploadPayload,
    at: NaiveDateTime,
) -> Result<String> {
    payload.validate()?;
    let payload = payload.with_default_type();

    let name = upload_name(at);
    match store.upload(&name, folder_id, &payload).await {
        Ok(file_id) => {
            info!(
                "uploaded {} ({} bytes) to {} as {}",
                name,
                payload.size(),
                store.backend_tag(),
                file_id
            );
            Ok(name)
        }
        Err(message) => {
            error!("upload of {} to {} failed: {}", name, store.backend_tag(), message);
            Err(PortalError::Upload(message))
        }
    }
}
