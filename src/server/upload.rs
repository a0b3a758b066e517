//! Multipart intake: stream file parts to the staging directory.

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use tokio::io::AsyncWriteExt;

use crate::common::config::DeliverySettings;
use crate::common::AppError;
use crate::delivery::StagedFile;

pub const DATA_FIELD: &str = "societyData";
pub const FILES_FIELD: &str = "pdfFiles";
const FALLBACK_FILE_NAME: &str = "document.pdf";

/// Parsed upload request. Staged files clean up after themselves on drop.
#[derive(Default)]
pub struct UploadForm {
    pub society_data: Option<String>,
    pub files: Vec<StagedFile>,
}

impl UploadForm {
    /// Recipient number from the `societyData` JSON, string or numeric.
    pub fn number(&self) -> String {
        let Some(raw) = self.society_data.as_deref() else {
            return String::new();
        };

        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(data) => match data.get("number") {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Number(n)) => n.to_string(),
                _ => String::new(),
            },
            Err(e) => {
                tracing::debug!(error = %e, "unparseable societyData");
                String::new()
            }
        }
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(format!("malformed multipart body: {}", err.body_text()))
    }
}

/// Read every field; file parts are written to disk as they arrive.
pub async fn stage_multipart(
    mut multipart: Multipart,
    settings: &DeliverySettings,
) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(DATA_FIELD) => {
                form.society_data = Some(field.text().await.map_err(multipart_error)?);
            }
            Some(FILES_FIELD) => {
                if form.files.len() >= settings.max_files {
                    return Err(AppError::BadRequest(format!(
                        "too many files: at most {} per request",
                        settings.max_files
                    )));
                }
                let staged = stage_file(field, settings).await?;
                form.files.push(staged);
            }
            other => {
                tracing::debug!(field = ?other, "ignoring multipart field");
            }
        }
    }

    tracing::debug!(files = form.files.len(), "upload staged");
    Ok(form)
}

async fn stage_file(
    mut field: Field<'_>,
    settings: &DeliverySettings,
) -> Result<StagedFile, AppError> {
    let file_name = field
        .file_name()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(FALLBACK_FILE_NAME)
        .to_string();

    let (mut staged, mut file) = StagedFile::create(&settings.upload_dir, file_name).await?;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        let size = staged.add_len(chunk.len() as u64);
        if size > settings.max_file_size {
            return Err(AppError::PayloadTooLarge(format!(
                "{} exceeds the {} byte limit",
                staged.file_name(),
                settings.max_file_size
            )));
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;
    }

    file.flush()
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok(staged)
}
