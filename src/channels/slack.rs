//! Slack channel — Web API client and webhook signature verification.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::warn;

use crate::error::ChannelError;
use crate::pipeline::types::SlackGateway;

type HmacSha256 = Hmac<Sha256>;

// ── Request signature verification ──────────────────────────────────

/// Slack signs each webhook with `v0=HMAC_SHA256(secret, "v0:{ts}:{body}")`.
/// Requests older than this window are rejected as replays.
const REPLAY_WINDOW_SECS: i64 = 300;

/// Verifies `X-Slack-Signature` headers.
#[derive(Clone)]
pub struct SignatureVerifier {
    signing_secret: SecretString,
}

impl SignatureVerifier {
    pub fn new(signing_secret: SecretString) -> Self {
        Self { signing_secret }
    }

    fn mac(&self, timestamp: &str, body: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.expose_secret().as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(format!("v0:{timestamp}:{body}").as_bytes());
        mac
    }

    /// Compute the `v0=...` signature for a request. Used by tests to build
    /// valid webhook calls.
    pub fn sign(&self, timestamp: &str, body: &str) -> String {
        format!("v0={}", hex::encode(self.mac(timestamp, body).finalize().into_bytes()))
    }

    /// Validate a request signature. Rejects malformed headers, stale
    /// timestamps and mismatched digests; the digest compare is
    /// constant-time.
    pub fn is_valid(&self, timestamp: &str, body: &str, signature: &str) -> bool {
        let Ok(ts) = timestamp.parse::<i64>() else {
            return false;
        };
        if (Utc::now().timestamp() - ts).abs() > REPLAY_WINDOW_SECS {
            return false;
        }

        let Some(hex_digest) = signature.strip_prefix("v0=") else {
            return false;
        };
        let Ok(expected) = hex::decode(hex_digest) else {
            return false;
        };

        self.mac(timestamp, body).verify_slice(&expected).is_ok()
    }
}

// ── Web API client ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct FileInfoPayload {
    file: FileInfo,
}

#[derive(Deserialize)]
struct FileInfo {
    url_private: String,
}

#[derive(Deserialize)]
struct UserInfoPayload {
    user: UserInfo,
}

#[derive(Deserialize)]
struct UserInfo {
    #[serde(default)]
    real_name: Option<String>,
}

/// Slack Web API client.
#[derive(Clone)]
pub struct SlackClient {
    bot_token: SecretString,
    client: reqwest::Client,
}

impl SlackClient {
    pub fn new(bot_token: SecretString, client: reqwest::Client) -> Self {
        Self { bot_token, client }
    }

    fn api_url(method: &str) -> String {
        format!("https://slack.com/api/{method}")
    }

    /// GET a Web API method and unwrap Slack's `ok`/`error` envelope.
    /// Slack reports API failures with HTTP 200 and `ok: false`.
    async fn get_api<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ChannelError> {
        let response = self
            .client
            .get(Self::api_url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|e| ChannelError::Request {
                name: "slack".into(),
                reason: e.to_string(),
            })?;

        let raw: serde_json::Value =
            response.json().await.map_err(|e| ChannelError::Request {
                name: "slack".into(),
                reason: e.to_string(),
            })?;

        let envelope: ApiEnvelope =
            serde_json::from_value(raw.clone()).map_err(|e| ChannelError::Request {
                name: "slack".into(),
                reason: e.to_string(),
            })?;
        if !envelope.ok {
            return Err(ChannelError::Api {
                name: "slack".into(),
                reason: format!("{method}: {}", envelope.error.unwrap_or_default()),
            });
        }

        serde_json::from_value(raw).map_err(|e| ChannelError::Api {
            name: "slack".into(),
            reason: format!("{method}: unexpected response shape: {e}"),
        })
    }
}

#[async_trait]
impl SlackGateway for SlackClient {
    async fn file_url(&self, file_id: &str) -> Result<String, ChannelError> {
        let payload: FileInfoPayload = self.get_api("files.info", &[("file", file_id)]).await?;
        Ok(payload.file.url_private)
    }

    async fn user_real_name(&self, user_id: &str) -> Option<String> {
        match self
            .get_api::<UserInfoPayload>("users.info", &[("user", user_id)])
            .await
        {
            Ok(payload) => payload.user.real_name.filter(|n| !n.is_empty()),
            Err(e) => {
                warn!(user_id, error = %e, "Slack user lookup failed");
                None
            }
        }
    }

    async fn post_message(&self, channel_id: &str, text: &str) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(Self::api_url("chat.postMessage"))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&json!({ "channel": channel_id, "text": text }))
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "slack".into(),
                reason: e.to_string(),
            })?;

        let envelope: ApiEnvelope =
            response.json().await.map_err(|e| ChannelError::SendFailed {
                name: "slack".into(),
                reason: e.to_string(),
            })?;
        if !envelope.ok {
            return Err(ChannelError::SendFailed {
                name: "slack".into(),
                reason: envelope.error.unwrap_or_default(),
            });
        }
        Ok(())
    }

    fn download_token(&self) -> String {
        self.bot_token.expose_secret().to_string()
    }
}
