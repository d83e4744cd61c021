//! Application context — every vendor client, built once at startup.
//!
//! The original bot held these as process-wide singletons; here they are
//! constructed explicitly from [`Config`] and handed to the worker pool and
//! the HTTP layer.

use std::sync::Arc;

use crate::channels::{SignatureVerifier, SlackClient, TwilioClient};
use crate::config::Config;
use crate::fetch::HttpMediaFetcher;
use crate::google::{GoogleAuthenticator, SheetsClient, VisionClient};
use crate::pipeline::ProcessorDeps;

/// Startup-built application context.
pub struct AppContext {
    pub config: Config,
    /// Pipeline collaborators, ready to hand to [`crate::pipeline::ReceiptProcessor`].
    pub deps: ProcessorDeps,
    /// Verifier for inbound Slack webhooks.
    pub slack_verifier: SignatureVerifier,
}

impl AppContext {
    /// Wire all vendor clients from the configuration. One `reqwest::Client`
    /// is shared across every outbound surface.
    pub fn from_config(config: Config) -> Self {
        let http = reqwest::Client::new();

        let auth = GoogleAuthenticator::new(config.google_key.clone(), http.clone());
        let vision = VisionClient::new(auth.clone(), http.clone());
        let sheets = SheetsClient::new(auth, http.clone(), config.spreadsheet_id.clone());

        let slack = SlackClient::new(config.slack.bot_token.clone(), http.clone());
        let twilio = TwilioClient::new(
            config.twilio.account_sid.clone(),
            config.twilio.auth_token.clone(),
            config.twilio.whatsapp_number.clone(),
            http.clone(),
        );

        let deps = ProcessorDeps {
            fetcher: Arc::new(HttpMediaFetcher::new(http)),
            ocr: Arc::new(vision),
            ledger: Arc::new(sheets),
            slack: Arc::new(slack),
            whatsapp: Arc::new(twilio),
        };

        let slack_verifier = SignatureVerifier::new(config.slack.signing_secret.clone());

        Self {
            config,
            deps,
            slack_verifier,
        }
    }
}
