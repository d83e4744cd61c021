//! Twilio channel — WhatsApp sends via the Messages API, webhook replies
//! via TwiML markup.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::ChannelError;
use crate::pipeline::types::WhatsAppGateway;

// ── TwiML ───────────────────────────────────────────────────────────

/// Render a TwiML messaging reply with one `<Message>` body.
pub fn twiml_message(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        escape_xml(body)
    )
}

/// Render an empty TwiML reply (acknowledge without messaging back).
pub fn twiml_empty() -> String {
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response></Response>".to_string()
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

// ── Messages API client ─────────────────────────────────────────────

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// Twilio REST client bound to one WhatsApp sender number.
#[derive(Clone)]
pub struct TwilioClient {
    account_sid: String,
    auth_token: SecretString,
    from_number: String,
    client: reqwest::Client,
}

impl TwilioClient {
    pub fn new(
        account_sid: String,
        auth_token: SecretString,
        from_number: String,
        client: reqwest::Client,
    ) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number,
            client,
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        )
    }
}

#[async_trait]
impl WhatsAppGateway for TwilioClient {
    async fn send_message(&self, to: &str, body: &str) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&[("From", self.from_number.as_str()), ("To", to), ("Body", body)])
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "twilio".into(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let reason = match response.json::<ApiError>().await {
                Ok(err) => format!("HTTP {status}: {}", err.message),
                Err(_) => format!("HTTP {status}"),
            };
            return Err(ChannelError::SendFailed {
                name: "twilio".into(),
                reason,
            });
        }
        Ok(())
    }
}

/// Strip Twilio's `whatsapp:` scheme off a sender address.
pub fn strip_whatsapp_prefix(from: &str) -> &str {
    from.strip_prefix("whatsapp:").unwrap_or(from)
}
