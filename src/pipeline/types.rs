//! Shared types and seam traits for the receipt pipeline.
//!
//! The traits here are the pipeline's only view of the outside world:
//! media hosting, OCR, the spreadsheet, and the two reply channels.
//! Production wires the real clients in; tests substitute stubs.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ChannelError, FetchError, OcrError, SheetError};
use crate::extract::ExpenseFields;

/// Fixed status cell for newly appended rows ("awaiting review").
pub const STATUS_PENDING: &str = "Aguardando";

// ── Inbound jobs ────────────────────────────────────────────────────

/// A receipt event accepted by a webhook and queued for background work.
///
/// Ephemeral: lives from webhook validation to the end of one pipeline run.
#[derive(Debug, Clone)]
pub enum ReceiptJob {
    /// Slack `file_shared` event.
    Slack {
        job_id: Uuid,
        file_id: String,
        channel_id: String,
        user_id: String,
    },
    /// Twilio WhatsApp inbound message carrying media.
    WhatsApp {
        job_id: Uuid,
        /// Sender in Twilio's `whatsapp:+...` form.
        from: String,
        media_url: String,
    },
}

impl ReceiptJob {
    pub fn slack(file_id: &str, channel_id: &str, user_id: &str) -> Self {
        Self::Slack {
            job_id: Uuid::new_v4(),
            file_id: file_id.to_string(),
            channel_id: channel_id.to_string(),
            user_id: user_id.to_string(),
        }
    }

    pub fn whatsapp(from: &str, media_url: &str) -> Self {
        Self::WhatsApp {
            job_id: Uuid::new_v4(),
            from: from.to_string(),
            media_url: media_url.to_string(),
        }
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            Self::Slack { job_id, .. } | Self::WhatsApp { job_id, .. } => *job_id,
        }
    }

    /// Originating channel name for logs.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Slack { .. } => "slack",
            Self::WhatsApp { .. } => "whatsapp",
        }
    }
}

// ── Ledger row ──────────────────────────────────────────────────────

/// One processed receipt, ready to be appended to the sheet.
///
/// Immutable once built; written exactly once, never updated.
#[derive(Debug, Clone)]
pub struct ExpenseRecord {
    pub fields: ExpenseFields,
    /// Human-readable submitter (Slack real name or WhatsApp number).
    pub submitted_by: String,
    /// Where the original image lives.
    pub source_url: String,
}

impl ExpenseRecord {
    /// Positional 7-cell row: date, user, amount, merchant, description,
    /// status, source URL. The amount is a JSON number when extracted so the
    /// sheet's `USER_ENTERED` coercion treats it as numeric.
    pub fn to_row(&self) -> Vec<Value> {
        let amount_cell = match self.fields.amount {
            Some(v) => Value::from(v),
            None => Value::from(crate::extract::NOT_FOUND),
        };
        vec![
            Value::from(self.fields.date_label()),
            Value::from(self.submitted_by.as_str()),
            amount_cell,
            Value::from(self.fields.merchant_label()),
            Value::from(self.fields.description.as_str()),
            Value::from(STATUS_PENDING),
            Value::from(self.source_url.as_str()),
        ]
    }
}

// ── Seam traits ─────────────────────────────────────────────────────

/// Downloads receipt images. Implementations must bound the request time.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// GET `url`, attaching `Authorization: Bearer` when a credential is
    /// supplied. Non-success statuses are hard failures.
    async fn fetch(&self, url: &str, bearer: Option<&str>) -> Result<Vec<u8>, FetchError>;
}

/// Turns image bytes into text.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Returns the recognized text, or `""` when the service finds none.
    async fn recognize(&self, image: &[u8]) -> Result<String, OcrError>;
}

/// Appends rows to the shared ledger spreadsheet.
#[async_trait]
pub trait LedgerAppender: Send + Sync {
    async fn append_row(&self, row: Vec<Value>) -> Result<(), SheetError>;
}

/// Slack Web API surface the pipeline needs.
#[async_trait]
pub trait SlackGateway: Send + Sync {
    /// Resolve a file id to its private download URL.
    async fn file_url(&self, file_id: &str) -> Result<String, ChannelError>;

    /// Resolve a user id to a display name, `None` when the lookup fails
    /// or the profile has no real name.
    async fn user_real_name(&self, user_id: &str) -> Option<String>;

    /// Post a message to a channel.
    async fn post_message(&self, channel_id: &str, text: &str) -> Result<(), ChannelError>;

    /// Bot token used as the bearer for `url_private` downloads.
    fn download_token(&self) -> String;
}

/// Twilio Messages API surface the pipeline needs.
#[async_trait]
pub trait WhatsAppGateway: Send + Sync {
    /// Send a WhatsApp message to `to` (in `whatsapp:+...` form).
    async fn send_message(&self, to: &str, body: &str) -> Result<(), ChannelError>;
}

/// Consumes queued jobs. The worker pool is generic over this so queue
/// semantics are testable without the real pipeline.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: ReceiptJob);
}

#[cfg(test)]
mod tests {
    use crate::extract::parse_expense_text;

    use super::*;

    #[test]
    fn record_builds_seven_cell_row_in_order() {
        let record = ExpenseRecord {
            fields: parse_expense_text("Total R$ 45,90 Data 01/04/2024"),
            submitted_by: "Maria Silva".into(),
            source_url: "https://files.example/abc".into(),
        };
        let row = record.to_row();
        assert_eq!(row.len(), 7);
        assert_eq!(row[0], "01/04/2024");
        assert_eq!(row[1], "Maria Silva");
        assert_eq!(row[2], 45.90);
        assert_eq!(row[3], "Não encontrado");
        assert_eq!(row[4], "Total R$ 45,90 Data 01/04/2024");
        assert_eq!(row[5], "Aguardando");
        assert_eq!(row[6], "https://files.example/abc");
    }

    #[test]
    fn missing_fields_render_sentinels() {
        let record = ExpenseRecord {
            fields: parse_expense_text("ilegível"),
            submitted_by: "+5511987654321".into(),
            source_url: "https://media.example/1".into(),
        };
        let row = record.to_row();
        assert_eq!(row[0], "Não encontrada");
        assert_eq!(row[2], "Não encontrado");
    }

    #[test]
    fn jobs_carry_distinct_ids() {
        let a = ReceiptJob::slack("F1", "C1", "U1");
        let b = ReceiptJob::slack("F1", "C1", "U1");
        assert_ne!(a.job_id(), b.job_id());
        assert_eq!(a.channel(), "slack");
        assert_eq!(ReceiptJob::whatsapp("whatsapp:+55", "u").channel(), "whatsapp");
    }
}
