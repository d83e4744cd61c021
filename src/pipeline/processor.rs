//! Background receipt processor.
//!
//! One processor serves both channels; the steps differ only in how the
//! media URL and the sender label are resolved and which channel carries
//! the reply. Any failure inside a run is caught at the top of
//! [`ReceiptProcessor::process`] and reported back to the sender on the
//! originating channel. A row already appended is never rolled back when a
//! later reply send fails.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::Error;
use crate::extract::{ExpenseFields, parse_expense_text};
use crate::pipeline::types::{
    ExpenseRecord, JobHandler, LedgerAppender, MediaFetcher, ReceiptJob, SlackGateway,
    TextRecognizer, WhatsAppGateway,
};

/// Reply description preview length, in characters.
const DESCRIPTION_PREVIEW_CHARS: usize = 100;

/// External collaborators the pipeline runs against.
#[derive(Clone)]
pub struct ProcessorDeps {
    pub fetcher: Arc<dyn MediaFetcher>,
    pub ocr: Arc<dyn TextRecognizer>,
    pub ledger: Arc<dyn LedgerAppender>,
    pub slack: Arc<dyn SlackGateway>,
    pub whatsapp: Arc<dyn WhatsAppGateway>,
}

/// Orchestrates one receipt from inbound event to ledger row and reply.
pub struct ReceiptProcessor {
    deps: ProcessorDeps,
}

impl ReceiptProcessor {
    pub fn new(deps: ProcessorDeps) -> Self {
        Self { deps }
    }

    /// Run the pipeline for one job, routing any failure to an error reply.
    pub async fn process(&self, job: ReceiptJob) {
        let job_id = job.job_id();
        let channel = job.channel();
        info!(%job_id, channel, "Processing receipt");

        let outcome = match &job {
            ReceiptJob::Slack {
                file_id,
                channel_id,
                user_id,
                ..
            } => self.process_slack(file_id, channel_id, user_id).await,
            ReceiptJob::WhatsApp {
                from, media_url, ..
            } => self.process_whatsapp(from, media_url).await,
        };

        if let Err(e) = outcome {
            error!(%job_id, channel, error = %e, "Receipt processing failed");
            self.send_error_reply(&job, &e).await;
        } else {
            info!(%job_id, channel, "Receipt processed");
        }
    }

    async fn process_slack(
        &self,
        file_id: &str,
        channel_id: &str,
        user_id: &str,
    ) -> Result<(), Error> {
        let download_url = self.deps.slack.file_url(file_id).await?;
        let token = self.deps.slack.download_token();
        let image = self.deps.fetcher.fetch(&download_url, Some(&token)).await?;

        let text = self.deps.ocr.recognize(&image).await?;
        let fields = parse_expense_text(&text);

        let submitted_by = match self.deps.slack.user_real_name(user_id).await {
            Some(name) => name,
            None => format!("Usuário {user_id}"),
        };

        let record = ExpenseRecord {
            fields,
            submitted_by,
            source_url: download_url,
        };
        self.deps.ledger.append_row(record.to_row()).await?;

        let message = confirmation_message(&record.fields, true);
        self.deps.slack.post_message(channel_id, &message).await?;
        Ok(())
    }

    async fn process_whatsapp(&self, from: &str, media_url: &str) -> Result<(), Error> {
        let image = self.deps.fetcher.fetch(media_url, None).await?;

        let text = self.deps.ocr.recognize(&image).await?;
        let fields = parse_expense_text(&text);

        // The phone number stands in for a name on this channel.
        let submitted_by = crate::channels::twilio::strip_whatsapp_prefix(from).to_string();

        let record = ExpenseRecord {
            fields,
            submitted_by,
            source_url: media_url.to_string(),
        };
        self.deps.ledger.append_row(record.to_row()).await?;

        let message = confirmation_message(&record.fields, false);
        self.deps.whatsapp.send_message(from, &message).await?;
        Ok(())
    }

    /// Best-effort error reply on the originating channel. The raw error
    /// text is surfaced to the sender, as the original bot did; see
    /// DESIGN.md for the noted information-leak trade-off.
    async fn send_error_reply(&self, job: &ReceiptJob, e: &Error) {
        let message = format!(
            "Ops! Houve um erro ao processar seu comprovante. Por favor, tente novamente \
             ou entre em contato com o suporte. Erro: {e}"
        );
        let result = match job {
            ReceiptJob::Slack { channel_id, .. } => {
                self.deps.slack.post_message(channel_id, &message).await
            }
            ReceiptJob::WhatsApp { from, .. } => {
                self.deps.whatsapp.send_message(from, &message).await
            }
        };
        if let Err(send_err) = result {
            error!(job_id = %job.job_id(), error = %send_err, "Error reply could not be delivered");
        }
    }
}

#[async_trait]
impl JobHandler for ReceiptProcessor {
    async fn handle(&self, job: ReceiptJob) {
        self.process(job).await;
    }
}

/// Confirmation text shared by both channels; Slack gets bold markup.
fn confirmation_message(fields: &ExpenseFields, markdown: bool) -> String {
    let preview: String = fields
        .description
        .chars()
        .take(DESCRIPTION_PREVIEW_CHARS)
        .collect();
    let (b, e) = if markdown { ("*", "*") } else { ("", "") };
    format!(
        "Recebi seu comprovante de gasto. Processado! 🎉\n\
         {b}Data:{e} {}\n\
         {b}Valor:{e} R$ {}\n\
         {b}Descrição OCR:{e} {preview}...\n\
         Foi adicionado à planilha de reembolsos. Obrigado!",
        fields.date_label(),
        fields.amount_label(),
    )
}
