use serde::Serialize;

/// Outcome of one file in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileStatus {
    Sent {
        #[serde(rename = "messageId")]
        message_id: String,
    },
    Failed {
        error: String,
    },
    /// Never attempted because an earlier file failed.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileResult {
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(flatten)]
    pub status: FileStatus,
}

/// Per-file results of one `send_documents` call, in upload order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub recipient: String,
    pub results: Vec<FileResult>,
}

impl DeliveryReport {
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, file_name: &str, status: FileStatus) {
        self.results.push(FileResult {
            file_name: file_name.to_string(),
            status,
        });
    }

    pub fn sent_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, FileStatus::Sent { .. }))
            .count()
    }

    pub fn is_complete(&self) -> bool {
        !self.results.is_empty() && self.sent_count() == self.results.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_flat_status_entries() {
        let mut report = DeliveryReport::new("9876543210");
        report.push(
            "a.pdf",
            FileStatus::Sent {
                message_id: "m1".to_string(),
            },
        );
        report.push(
            "b.pdf",
            FileStatus::Failed {
                error: "socket closed".to_string(),
            },
        );
        report.push("c.pdf", FileStatus::Skipped);

        assert_eq!(
            serde_json::to_value(&report.results).expect("serialize"),
            json!([
                { "fileName": "a.pdf", "status": "sent", "messageId": "m1" },
                { "fileName": "b.pdf", "status": "failed", "error": "socket closed" },
                { "fileName": "c.pdf", "status": "skipped" }
            ])
        );
        assert_eq!(report.sent_count(), 1);
        assert!(!report.is_complete());
    }
}
