//! Validate an upload batch and dispatch it file by file.

mod report;
pub mod staging;

pub use report::{DeliveryReport, FileResult, FileStatus};
pub use staging::StagedFile;

use crate::common::config::DeliverySettings;
use crate::common::phone;
use crate::session::{
    DispatchError, DocumentMessage, MessageReceipt, SessionHandle, SessionLease,
};

pub const PDF_MIME_TYPE: &str = "application/pdf";

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Messaging session not connected")]
    SessionNotReady,
    #[error("Invalid number")]
    InvalidNumber,
    #[error("No PDF files uploaded")]
    NoFiles,
    /// A dispatch failed and the rest of the batch was abandoned.
    #[error("delivery aborted after {} of {} file(s)", .0.sent_count(), .0.results.len())]
    Aborted(DeliveryReport),
}

/// Address of a national number on the messaging network.
pub fn recipient_jid(settings: &DeliverySettings, national_number: &str) -> String {
    format!(
        "{}{}@{}",
        settings.country_code, national_number, settings.address_domain
    )
}

/// Send every staged file to `raw_number`, in order, one at a time.
///
/// Checks run in order: session readiness, number, file count. Each staged
/// file is deleted once its dispatch attempt finishes, whatever the outcome.
/// The first failure stops the batch; later files are reported as skipped.
pub async fn send_documents(
    handle: &SessionHandle,
    settings: &DeliverySettings,
    raw_number: &str,
    files: Vec<StagedFile>,
) -> Result<DeliveryReport, DeliveryError> {
    let lease = handle.acquire().ok_or(DeliveryError::SessionNotReady)?;

    let number = phone::national_number(raw_number, &settings.country_code)
        .ok_or(DeliveryError::InvalidNumber)?;

    if files.is_empty() {
        return Err(DeliveryError::NoFiles);
    }

    let jid = recipient_jid(settings, &number);
    let mut report = DeliveryReport::new(number.clone());
    let mut files = files.into_iter();
    let mut failed = false;

    for file in files.by_ref() {
        let status = match dispatch_one(handle, &lease, &jid, &file).await {
            Ok(receipt) => {
                tracing::debug!(
                    file = %file.file_name(),
                    message_id = %receipt.message_id,
                    "document sent"
                );
                FileStatus::Sent {
                    message_id: receipt.message_id,
                }
            }
            Err(e) => {
                tracing::error!(file = %file.file_name(), error = %e, "Send Error");
                failed = true;
                FileStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        report.push(file.file_name(), status);
        file.discard().await;

        if failed {
            break;
        }
    }

    for file in files {
        report.push(file.file_name(), FileStatus::Skipped);
        file.discard().await;
    }

    if failed {
        return Err(DeliveryError::Aborted(report));
    }

    tracing::info!(
        count = report.sent_count(),
        recipient = %number,
        "Sent file(s)"
    );
    Ok(report)
}

async fn dispatch_one(
    handle: &SessionHandle,
    lease: &SessionLease,
    jid: &str,
    file: &StagedFile,
) -> Result<MessageReceipt, DispatchError> {
    let document = file.read().await?;

    // Socket may have been swapped while the previous file was in flight
    if !handle.is_current(lease) {
        return Err(DispatchError::SessionReplaced);
    }

    let message = DocumentMessage {
        document,
        mimetype: PDF_MIME_TYPE.to_string(),
        file_name: file.file_name().to_string(),
    };
    lease.socket.send_document(jid, message).await
}
